//! Recency-weighted distribution summaries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{calculate_time_decay_weight, calculate_weighted_percentile, Observation};
use crate::Result;

/// One reported percentile of a distribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PercentileValue {
    /// Percentile in `[0, 100]`
    pub percentile: f64,
    /// Recency-weighted value at that percentile
    pub value: f64,
}

/// Summary of a cost or latency distribution.
///
/// `mean` is the plain arithmetic mean; `percentiles` are computed over the
/// recency-weighted distribution so that recent observations dominate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionSummary {
    /// Arithmetic mean of all samples
    pub mean: f64,
    /// Number of samples summarized
    pub samples: usize,
    /// Sum of recency weights
    pub total_weight: f64,
    /// Requested percentiles, in request order
    pub percentiles: Vec<PercentileValue>,
}

impl DistributionSummary {
    /// Summarize `observations` as seen from `reference_time`.
    ///
    /// Non-finite values are skipped. Returns `Ok(None)` when nothing is
    /// left to summarize.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `half_life` is not positive or a
    /// requested percentile is outside `[0, 100]`.
    pub fn from_observations(
        observations: &[Observation],
        reference_time: DateTime<Utc>,
        half_life: Duration,
        percentiles: &[f64],
    ) -> Result<Option<Self>> {
        let usable: Vec<&Observation> = observations
            .iter()
            .filter(|o| o.value().is_finite())
            .collect();
        if usable.is_empty() {
            return Ok(None);
        }

        let values: Vec<f64> = usable.iter().map(|o| o.value()).collect();
        let weights = usable
            .iter()
            .map(|o| calculate_time_decay_weight(o.observed_at(), reference_time, half_life))
            .collect::<Result<Vec<f64>>>()?;

        let points = percentiles
            .iter()
            .map(|&p| {
                calculate_weighted_percentile(&values, &weights, p)
                    .map(|value| PercentileValue { percentile: p, value })
            })
            .collect::<Result<Vec<_>>>()?;

        #[allow(clippy::cast_precision_loss)]
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        Ok(Some(Self {
            mean,
            samples: values.len(),
            total_weight: weights.iter().sum(),
            percentiles: points,
        }))
    }

    /// Look up a reported percentile.
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|point| (point.percentile - p).abs() < f64::EPSILON)
            .map(|point| point.value)
    }
}
