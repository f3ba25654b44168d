//! Candidate evaluation
//!
//! An implementation is scored by running it on every test case through an
//! [`Oracle`] (the LLM provider) and judging each output with every grader
//! through a [`GraderRunner`]. The [`Evaluator`] fans the test cases out
//! concurrently under a bounded permit pool and rolls the verdicts up with
//! [`aggregate`].
//!
//! ## Missing is not zero
//!
//! An oracle failure, a grader error and a grader abstention all produce a
//! *missing* score. Missing scores are excluded from every mean; a grader with
//! no score on any case is excluded from the final score, and a candidate
//! with no grader score at all has `final_score == None`.

mod aggregator;
mod result;

pub use aggregator::{aggregate, CaseOutcome, Evaluator, SummarySettings};
pub use result::{EvaluationResult, GraderEvaluation};

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{GraderSpec, Implementation};

/// Output of one oracle call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    /// Generated output
    pub output: String,
    /// Cost of the call in provider currency units
    pub cost: f64,
    /// Wall-clock latency of the call in milliseconds
    pub latency_ms: f64,
}

impl Invocation {
    /// Create an invocation record.
    #[must_use]
    pub fn new(output: impl Into<String>, cost: f64, latency_ms: f64) -> Self {
        Self {
            output: output.into(),
            cost,
            latency_ms,
        }
    }
}

/// Oracle failure kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Failure limited to this call; the test case gets missing scores.
    #[error("transient oracle failure: {0}")]
    Transient(String),

    /// Failure that will repeat on every call (e.g. invalid credentials);
    /// aborts the run.
    #[error("fatal oracle failure: {0}")]
    Fatal(String),
}

/// Grader failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("grader failed: {0}")]
pub struct GraderError(pub String);

/// One grader's verdict on one test case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraderScore {
    value: f64,
    reasonings: Vec<String>,
}

impl GraderScore {
    /// A continuous score; expected within `[0, 1]`.
    #[must_use]
    pub const fn continuous(value: f64) -> Self {
        Self {
            value,
            reasonings: Vec::new(),
        }
    }

    /// A pass/fail verdict coerced to `1.0` / `0.0`.
    #[must_use]
    pub const fn boolean(passed: bool) -> Self {
        Self::continuous(if passed { 1.0 } else { 0.0 })
    }

    /// Attach a textual justification.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasonings.push(reasoning.into());
        self
    }

    /// Get the score value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the justifications.
    #[must_use]
    pub fn reasonings(&self) -> &[String] {
        &self.reasonings
    }

    /// Whether the value is a finite number within `[0, 1]`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.value.is_finite() && (0.0..=1.0).contains(&self.value)
    }
}

/// Executes an implementation against one input.
pub trait Oracle: Send + Sync {
    /// Run `implementation` on `input`.
    fn invoke(
        &self,
        implementation: &Implementation,
        input: &str,
    ) -> impl Future<Output = Result<Invocation, OracleError>> + Send;
}

/// Runs a configured grader against one output.
pub trait GraderRunner: Send + Sync {
    /// Judge `output` against `expected_output` with `grader`.
    ///
    /// `Ok(None)` means the grader abstained.
    fn score(
        &self,
        grader: &GraderSpec,
        output: &str,
        expected_output: &str,
    ) -> impl Future<Output = Result<Option<GraderScore>, GraderError>> + Send;
}
