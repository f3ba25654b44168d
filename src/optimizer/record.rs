//! Run log records returned to the caller

use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationResult;
use crate::stats::DistributionSummary;
use crate::task::FieldOverrides;

/// Why the search loop ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ran `max_iterations` iterations.
    MaxIterations,
    /// `patience` consecutive iterations failed to improve.
    Converged,
    /// The run's wall-clock budget was spent.
    Deadline,
}

/// Why a proposed candidate has no evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CandidateFailure {
    /// Proposal touched a field outside the allowed set or had unusable values.
    Rejected(String),
    /// Evaluation exceeded the candidate timeout.
    TimedOut,
    /// Evaluation ended without a result.
    Aborted(String),
}

/// One candidate proposed during an iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    /// Position in the generator's output
    pub generation_index: usize,
    /// Created implementation; `None` for rejected proposals
    pub implementation_id: Option<String>,
    /// Proposed field changes
    pub overrides: FieldOverrides,
    /// Evaluation, if it completed
    pub evaluation: Option<EvaluationResult>,
    /// Why there is no evaluation
    pub failure: Option<CandidateFailure>,
}

impl CandidateRecord {
    /// Final score of the candidate, if it was scored.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.evaluation.as_ref().and_then(|e| e.final_score)
    }
}

/// One iteration of the run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationRecord {
    /// Iteration number (1-based)
    pub iteration: u32,
    /// Field changes of the selected candidate
    pub proposed_changes: Option<FieldOverrides>,
    /// Selected candidate; `None` if generation produced nothing usable
    pub candidate_id: Option<String>,
    /// Evaluation of the selected candidate; `None` if it failed
    pub evaluation: Option<EvaluationResult>,
    /// Whether the selected candidate became the new best
    pub improved: bool,
    /// Best score after this iteration
    pub best_score_after: Option<f64>,
    /// Consecutive non-improving iterations after this one
    pub non_improving_streak: u32,
    /// Generator failure, if the generator produced nothing
    pub generation_failure: Option<String>,
    /// Every candidate of the iteration, in completion order
    pub candidates: Vec<CandidateRecord>,
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationResult {
    /// Optimized task
    pub task_id: String,
    /// Best candidate; `None` if nothing beat the baseline
    pub best_implementation_id: Option<String>,
    /// Best score seen (the baseline's until a candidate improves on it)
    pub best_score: Option<f64>,
    /// Score of the unmodified task configuration
    pub baseline_score: Option<f64>,
    /// Iterations actually run
    pub iterations_run: u32,
    /// Why the loop ended
    pub stop_reason: StopReason,
    /// Cost of every successful oracle call of the run, baseline included
    pub total_cost: f64,
    /// Recency-weighted cost distribution over the whole run
    pub cost_summary: Option<DistributionSummary>,
    /// Recency-weighted latency distribution over the whole run
    pub latency_summary: Option<DistributionSummary>,
    /// Baseline evaluation, if it completed
    pub baseline_evaluation: Option<EvaluationResult>,
    /// Iteration log, one record per iteration run
    pub iterations: Vec<IterationRecord>,
}

impl OptimizationResult {
    /// Whether some candidate beat the baseline.
    #[must_use]
    pub const fn improved_on_baseline(&self) -> bool {
        self.best_implementation_id.is_some()
    }

    /// Recompute the best candidate from the iteration log.
    ///
    /// Agrees with `best_implementation_id`/`best_score` for any result
    /// produced by the engine.
    #[must_use]
    pub fn best_from_log(&self) -> Option<(&str, f64)> {
        self.iterations
            .iter()
            .rev()
            .find(|it| it.improved)
            .and_then(|it| Some((it.candidate_id.as_deref()?, it.best_score_after?)))
    }
}
