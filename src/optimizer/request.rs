//! Optimization Request - validated contract of the `run` operation

use serde::{Deserialize, Serialize};

use crate::task::{MutableField, MutableFieldSet};
use crate::{Error, Result};

/// Parameters of one optimization run.
///
/// Unknown fields are rejected on deserialization, so every parameter the
/// engine honours is part of this contract, `variants_per_iter` and
/// `improvement_threshold` included.
///
/// ```rust
/// use llmtrace_optimizer::optimizer::OptimizationRequest;
///
/// let request: OptimizationRequest = serde_json::from_str(r#"{
///     "task_id": "task-1",
///     "max_iterations": 10,
///     "changeable_fields": ["prompt", "temperature"],
///     "patience": 3,
///     "improvement_threshold": 0.05
/// }"#)?;
/// request.validate()?;
/// # Ok::<(), llmtrace_optimizer::Error>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OptimizationRequest {
    /// Task to optimize
    pub task_id: String,
    /// Upper bound on search iterations (≥ 1)
    pub max_iterations: u32,
    /// Fields candidates may change
    pub changeable_fields: MutableFieldSet,
    /// Consecutive non-improving iterations tolerated (≥ 1)
    pub patience: u32,
    /// Candidates per iteration; engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants_per_iter: Option<usize>,
    /// Minimum score gain counted as improvement; any positive gain when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_threshold: Option<f64>,
}

impl OptimizationRequest {
    /// Create a request with the required parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `changeable_fields` is empty or
    /// contains duplicates.
    pub fn new(
        task_id: impl Into<String>,
        max_iterations: u32,
        changeable_fields: impl IntoIterator<Item = MutableField>,
        patience: u32,
    ) -> Result<Self> {
        Ok(Self {
            task_id: task_id.into(),
            max_iterations,
            changeable_fields: MutableFieldSet::new(changeable_fields)?,
            patience,
            variants_per_iter: None,
            improvement_threshold: None,
        })
    }

    /// Set the number of candidates per iteration.
    #[must_use]
    pub const fn with_variants_per_iter(mut self, variants: usize) -> Self {
        self.variants_per_iter = Some(variants);
        self
    }

    /// Set the minimum score gain counted as improvement.
    #[must_use]
    pub const fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = Some(threshold);
        self
    }

    /// Check the numeric parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the offending parameter.
    pub fn validate(&self) -> Result<()> {
        if self.task_id.trim().is_empty() {
            return Err(Error::InvalidInput("task_id must not be blank".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidInput("max_iterations must be at least 1".to_string()));
        }
        if self.patience == 0 {
            return Err(Error::InvalidInput("patience must be at least 1".to_string()));
        }
        if self.variants_per_iter == Some(0) {
            return Err(Error::InvalidInput(
                "variants_per_iter must be at least 1".to_string(),
            ));
        }
        if let Some(t) = self.improvement_threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "improvement_threshold must be a non-negative number, got {t}"
                )));
            }
        }
        Ok(())
    }
}
