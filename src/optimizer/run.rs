//! Process-scoped state of one optimization run

use std::sync::Arc;

use super::{IterationRecord, OptimizationResult, StopReason};
use crate::evaluation::{EvaluationResult, SummarySettings};
use crate::stats::{DistributionSummary, Observation};
use crate::task::Implementation;
use crate::Result;

/// Absolute slack on the threshold comparison, so that a gain equal to the
/// threshold still counts after floating-point subtraction.
pub const IMPROVEMENT_TOLERANCE: f64 = 1e-9;

/// Whether `score` improves on `best` under `threshold`.
///
/// With no best score every score improves. Otherwise the gain must be
/// strictly positive and at least the threshold (inclusive).
#[must_use]
pub fn is_improvement(best: Option<f64>, score: f64, threshold: Option<f64>) -> bool {
    let Some(best) = best else {
        return true;
    };
    let delta = score - best;
    delta > 0.0 && delta >= threshold.unwrap_or(0.0) - IMPROVEMENT_TOLERANCE
}

/// Mutable bookkeeping for one `Optimizer::run` call; never outlives it.
#[derive(Debug)]
pub(super) struct OptimizationRun {
    task_id: String,
    best: Arc<Implementation>,
    best_implementation_id: Option<String>,
    best_score: Option<f64>,
    baseline_score: Option<f64>,
    baseline_evaluation: Option<EvaluationResult>,
    streak: u32,
    log: Vec<IterationRecord>,
    total_cost: f64,
    cost_observations: Vec<Observation>,
    latency_observations: Vec<Observation>,
}

impl OptimizationRun {
    pub(super) fn new(baseline: Arc<Implementation>, baseline_evaluation: Option<EvaluationResult>) -> Self {
        let baseline_score = baseline_evaluation.as_ref().and_then(|e| e.final_score);
        let mut run = Self {
            task_id: baseline.task_id().to_string(),
            best: baseline,
            best_implementation_id: None,
            best_score: baseline_score,
            baseline_score,
            baseline_evaluation: None,
            streak: 0,
            log: Vec::new(),
            total_cost: 0.0,
            cost_observations: Vec::new(),
            latency_observations: Vec::new(),
        };
        if let Some(evaluation) = &baseline_evaluation {
            run.absorb(evaluation);
        }
        run.baseline_evaluation = baseline_evaluation;
        run
    }

    /// Implementation new candidates are derived from.
    pub(super) const fn best(&self) -> &Arc<Implementation> {
        &self.best
    }

    pub(super) const fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub(super) const fn streak(&self) -> u32 {
        self.streak
    }

    /// Add an evaluation's cost and latency samples to the run totals.
    pub(super) fn absorb(&mut self, evaluation: &EvaluationResult) {
        self.total_cost += evaluation.total_cost;
        self.cost_observations
            .extend_from_slice(&evaluation.cost_observations);
        self.latency_observations
            .extend_from_slice(&evaluation.latency_observations);
    }

    pub(super) fn improves(&self, score: f64, threshold: Option<f64>) -> bool {
        is_improvement(self.best_score, score, threshold)
    }

    pub(super) fn promote(&mut self, implementation: Arc<Implementation>, score: f64) {
        self.best_implementation_id = Some(implementation.id().to_string());
        self.best_score = Some(score);
        self.best = implementation;
        self.streak = 0;
    }

    pub(super) fn mark_not_improved(&mut self) -> u32 {
        self.streak += 1;
        self.streak
    }

    pub(super) fn record_iteration(&mut self, record: IterationRecord) {
        self.log.push(record);
    }

    pub(super) fn finish(
        self,
        stop_reason: StopReason,
        settings: &SummarySettings,
    ) -> Result<OptimizationResult> {
        let cost_summary = DistributionSummary::from_observations(
            &self.cost_observations,
            settings.reference_time,
            settings.half_life,
            &settings.percentiles,
        )?;
        let latency_summary = DistributionSummary::from_observations(
            &self.latency_observations,
            settings.reference_time,
            settings.half_life,
            &settings.percentiles,
        )?;

        Ok(OptimizationResult {
            task_id: self.task_id,
            best_implementation_id: self.best_implementation_id,
            best_score: self.best_score,
            baseline_score: self.baseline_score,
            iterations_run: u32::try_from(self.log.len()).unwrap_or(u32::MAX),
            stop_reason,
            total_cost: self.total_cost,
            cost_summary,
            latency_summary,
            baseline_evaluation: self.baseline_evaluation,
            iterations: self.log,
        })
    }
}
