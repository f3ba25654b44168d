//! Observation - one timestamped cost or latency sample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single measured value (cost in provider currency units, or latency in
/// milliseconds) together with the wall-clock time it was taken.
///
/// The timestamp drives recency weighting in [`super::DistributionSummary`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    value: f64,
    observed_at: DateTime<Utc>,
}

impl Observation {
    /// Create an observation stamped with the current time.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
        }
    }

    /// Create a builder for an observation with a custom timestamp.
    #[must_use]
    pub fn builder(value: f64) -> ObservationBuilder {
        ObservationBuilder::new(value)
    }

    /// Get the measured value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the time the value was measured.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Builder for `Observation`.
#[derive(Debug)]
pub struct ObservationBuilder {
    value: f64,
    observed_at: DateTime<Utc>,
}

impl ObservationBuilder {
    /// Create a new builder; the timestamp defaults to now.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
        }
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Build the `Observation`.
    #[must_use]
    pub const fn build(self) -> Observation {
        Observation {
            value: self.value,
            observed_at: self.observed_at,
        }
    }
}
