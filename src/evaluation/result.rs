//! Evaluation Result - write-once outcome of one evaluation pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::{DistributionSummary, Observation};

/// Aggregated verdict of one grader over the whole test suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraderEvaluation {
    /// Grader ID
    pub grader_id: String,
    /// Grader name
    pub grader_name: String,
    /// Mean of the available scores; `None` if the grader never scored
    pub score: Option<f64>,
    /// Test cases with a usable score
    pub scored_cases: usize,
    /// Test cases without one (oracle failure, grader error or abstention)
    pub missing_cases: usize,
    /// Justifications collected across test cases
    pub reasonings: Vec<String>,
}

/// Outcome of running one implementation against a task's test suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    /// Evaluated implementation
    pub implementation_id: String,
    /// Per-grader results, in the task's grader order
    pub grader_scores: Vec<GraderEvaluation>,
    /// Mean cost per successful oracle call
    pub average_cost: Option<f64>,
    /// Mean latency per successful oracle call
    pub average_latency_ms: Option<f64>,
    /// Recency-weighted cost distribution
    pub cost_summary: Option<DistributionSummary>,
    /// Recency-weighted latency distribution
    pub latency_summary: Option<DistributionSummary>,
    /// Sum of the cost of every successful oracle call
    pub total_cost: f64,
    /// Test cases in the suite
    pub test_cases: usize,
    /// Oracle calls that failed
    pub failed_invocations: usize,
    /// Mean of the non-missing grader scores; `None` if all are missing
    pub final_score: Option<f64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Raw cost samples, kept for run-level summaries
    #[serde(skip)]
    pub cost_observations: Vec<Observation>,
    /// Raw latency samples, kept for run-level summaries
    #[serde(skip)]
    pub latency_observations: Vec<Observation>,
}

impl EvaluationResult {
    /// Whether at least one grader produced a usable score.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        self.final_score.is_some()
    }

    /// Look up one grader's result.
    #[must_use]
    pub fn grader(&self, grader_id: &str) -> Option<&GraderEvaluation> {
        self.grader_scores.iter().find(|g| g.grader_id == grader_id)
    }
}
