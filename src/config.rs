//! Engine configuration
//!
//! `OptimizerConfig` bounds the resources one run may use: how many oracle
//! calls run at once per candidate, how long a candidate evaluation or a
//! generator call may take, and how cost/latency summaries are weighted.
//! It deserializes from JSON with every field optional.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{Error, Result};

/// Default fan-out limit per candidate evaluation
pub const DEFAULT_FAN_OUT_LIMIT: usize = 8;

/// Default candidate evaluation timeout (2 minutes)
pub const DEFAULT_CANDIDATE_TIMEOUT_MS: u64 = 120_000;

/// Default candidate generation timeout (1 minute)
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 60_000;

/// Default recency half life for cost/latency weighting (1 hour)
pub const DEFAULT_DECAY_HALF_LIFE_MS: u64 = 3_600_000;

/// Optimization engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Max concurrent test-case invocations within one candidate evaluation,
    /// in `1..=Semaphore::MAX_PERMITS`
    pub fan_out_limit: usize,
    /// Wall-clock bound on one candidate evaluation
    pub candidate_timeout_ms: u64,
    /// Wall-clock bound on one generator call
    pub generation_timeout_ms: u64,
    /// Optional wall-clock budget for a whole run
    pub run_timeout_ms: Option<u64>,
    /// Candidates per iteration when a request does not say
    pub default_variants_per_iter: usize,
    /// Half life of recency weights in cost/latency summaries
    pub decay_half_life_ms: u64,
    /// Percentiles reported in cost/latency summaries
    pub summary_percentiles: Vec<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            fan_out_limit: DEFAULT_FAN_OUT_LIMIT,
            candidate_timeout_ms: DEFAULT_CANDIDATE_TIMEOUT_MS,
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            run_timeout_ms: None,
            default_variants_per_iter: 1,
            decay_half_life_ms: DEFAULT_DECAY_HALF_LIFE_MS,
            summary_percentiles: vec![50.0, 95.0],
        }
    }
}

impl OptimizerConfig {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` on malformed input, `Error::InvalidConfig` if
    /// the values fail validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`OptimizerConfig::from_json_str`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.fan_out_limit == 0 {
            return Err(Error::InvalidConfig("fan_out_limit must be at least 1".to_string()));
        }
        if self.fan_out_limit > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig(format!(
                "fan_out_limit must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.fan_out_limit
            )));
        }
        if self.candidate_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "candidate_timeout_ms must be positive".to_string(),
            ));
        }
        if self.generation_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "generation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig("run_timeout_ms must be positive".to_string()));
        }
        if self.default_variants_per_iter == 0 {
            return Err(Error::InvalidConfig(
                "default_variants_per_iter must be at least 1".to_string(),
            ));
        }
        if self.decay_half_life_ms == 0 {
            return Err(Error::InvalidConfig(
                "decay_half_life_ms must be positive".to_string(),
            ));
        }
        if let Some(p) = self
            .summary_percentiles
            .iter()
            .find(|p| !(0.0..=100.0).contains(*p))
        {
            return Err(Error::InvalidConfig(format!(
                "summary percentile {p} is outside [0, 100]"
            )));
        }
        Ok(())
    }

    /// Candidate evaluation timeout.
    #[must_use]
    pub const fn candidate_timeout(&self) -> Duration {
        Duration::from_millis(self.candidate_timeout_ms)
    }

    /// Generator call timeout.
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Whole-run budget, if any.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Recency half life as a chrono duration.
    #[must_use]
    pub fn decay_half_life(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.decay_half_life_ms).unwrap_or(i64::MAX))
    }
}

/// Builder for `OptimizerConfig`.
#[derive(Debug, Default)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    /// Set the per-candidate fan-out limit.
    #[must_use]
    pub const fn fan_out_limit(mut self, limit: usize) -> Self {
        self.config.fan_out_limit = limit;
        self
    }

    /// Set the candidate evaluation timeout.
    #[must_use]
    pub const fn candidate_timeout_ms(mut self, ms: u64) -> Self {
        self.config.candidate_timeout_ms = ms;
        self
    }

    /// Set the generator call timeout.
    #[must_use]
    pub const fn generation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.generation_timeout_ms = ms;
        self
    }

    /// Set a whole-run wall-clock budget.
    #[must_use]
    pub const fn run_timeout_ms(mut self, ms: u64) -> Self {
        self.config.run_timeout_ms = Some(ms);
        self
    }

    /// Set the default number of candidates per iteration.
    #[must_use]
    pub const fn default_variants_per_iter(mut self, variants: usize) -> Self {
        self.config.default_variants_per_iter = variants;
        self
    }

    /// Set the recency half life.
    #[must_use]
    pub const fn decay_half_life_ms(mut self, ms: u64) -> Self {
        self.config.decay_half_life_ms = ms;
        self
    }

    /// Set the reported percentiles.
    #[must_use]
    pub fn summary_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.config.summary_percentiles = percentiles;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if validation fails.
    pub fn build(self) -> Result<OptimizerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
