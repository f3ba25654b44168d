//! Candidate generation
//!
//! A [`CandidateGenerator`] proposes field overrides for the next iteration
//! from the current best implementation. Strategies (LLM-driven rewriting,
//! random perturbation, grid search) are interchangeable; the controller
//! only requires that proposals stay within the allowed fields, and it
//! bounds every call with a timeout.

mod perturbation;

pub use perturbation::{PerturbationGenerator, PerturbationGeneratorBuilder};

use std::future::Future;

use thiserror::Error;

use crate::task::{FieldOverrides, Implementation, MutableFieldSet, Task};

/// Why a generator produced no proposals for an iteration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The strategy itself failed (e.g. the rewriting LLM call errored).
    #[error("candidate generation failed: {0}")]
    Failed(String),

    /// The call exceeded the generation timeout.
    #[error("candidate generation timed out after {0} ms")]
    TimedOut(u64),
}

/// Inputs handed to a generator for one iteration.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// Task under optimization
    pub task: &'a Task,
    /// Best implementation so far (the baseline until something improves)
    pub current_best: &'a Implementation,
    /// Score of `current_best`, if it was scored
    pub best_score: Option<f64>,
    /// Fields proposals may touch
    pub allowed_fields: &'a MutableFieldSet,
    /// Iteration being generated for (1-based)
    pub iteration: u32,
    /// Number of proposals requested
    pub variants: usize,
}

/// Proposes candidate configurations.
pub trait CandidateGenerator: Send + Sync {
    /// Propose up to `ctx.variants` override sets, each confined to
    /// `ctx.allowed_fields`. Returning fewer (even none) is allowed.
    ///
    /// Overrides are applied to the task's baseline configuration, so a
    /// proposal that builds on `ctx.current_best` should start from its
    /// overrides.
    fn propose(
        &self,
        ctx: GenerationContext<'_>,
    ) -> impl Future<Output = Result<Vec<FieldOverrides>, GenerationError>> + Send;
}
