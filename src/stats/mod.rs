//! Statistics primitives for cost/latency accounting
//!
//! Cost and latency distributions of LLM calls are skewed, so summaries
//! report percentiles rather than only the mean, and weight each observation
//! by its recency so that stale measurements count less.
//!
//! ## Example
//!
//! ```rust
//! use llmtrace_optimizer::stats::{calculate_percentile, calculate_weighted_percentile};
//!
//! let p50 = calculate_percentile(&[10.0, 20.0, 30.0, 40.0], 50.0)?;
//! assert!((p50 - 25.0).abs() < 1e-9);
//!
//! // 20 weighs three times as much as 10, pulling the median towards it
//! let weighted = calculate_weighted_percentile(&[10.0, 20.0], &[1.0, 3.0], 50.0)?;
//! assert!((weighted - 20.0).abs() < 1e-9);
//!
//! // equal weights reproduce the unweighted percentile
//! let p75 = calculate_weighted_percentile(&[10.0, 20.0, 30.0, 40.0], &[2.0; 4], 75.0)?;
//! assert!((p75 - 32.5).abs() < 1e-9);
//! # Ok::<(), llmtrace_optimizer::Error>(())
//! ```

mod observation;
mod summary;

pub use observation::{Observation, ObservationBuilder};
pub use summary::{DistributionSummary, PercentileValue};

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result};

fn check_percentile(p: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&p) {
        return Err(Error::InvalidInput(format!(
            "percentile must be within [0, 100], got {p}"
        )));
    }
    Ok(())
}

fn check_values(values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::InvalidInput(
            "cannot compute a percentile of an empty sequence".to_string(),
        ));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(Error::InvalidInput("values must not contain NaN".to_string()));
    }
    Ok(())
}

/// The `p`-th percentile of `values`, interpolating linearly between the
/// two nearest ranks.
///
/// The rank of percentile `p` over `n` sorted values is `p / 100 * (n - 1)`.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `values` is empty, contains NaN, or `p`
/// is outside `[0, 100]`.
pub fn calculate_percentile(values: &[f64], p: f64) -> Result<f64> {
    check_percentile(p)?;
    check_values(values)?;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    #[allow(clippy::cast_precision_loss)]
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Seconds in `duration`, at nanosecond precision while it fits in `i64`.
#[allow(clippy::cast_precision_loss)]
fn as_secs_f64(duration: Duration) -> f64 {
    duration.num_nanoseconds().map_or_else(
        || duration.num_milliseconds() as f64 / 1e3,
        |nanos| nanos as f64 / 1e9,
    )
}

/// Recency weight of an observation: `1.0` at zero elapsed time, halving
/// every `half_life`, approaching (but never reaching) zero.
///
/// Observations stamped after `reference_time` are treated as current.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `half_life` is not strictly positive.
pub fn calculate_time_decay_weight(
    observation_time: DateTime<Utc>,
    reference_time: DateTime<Utc>,
    half_life: Duration,
) -> Result<f64> {
    if half_life <= Duration::zero() {
        return Err(Error::InvalidInput(format!(
            "half life must be positive, got {half_life}"
        )));
    }

    let elapsed = (reference_time - observation_time).max(Duration::zero());
    let half_lives = as_secs_f64(elapsed) / as_secs_f64(half_life);

    Ok(0.5_f64.powf(half_lives).max(f64::MIN_POSITIVE))
}

/// Weighted variant of [`calculate_percentile`].
///
/// Weights act as fractional repeat counts measured in units of the smallest
/// positive weight: a value of weight `w` occupies `w / w_min` consecutive
/// ranks, and the percentile is the rank `p / 100 * (W / w_min - 1)` of that
/// expanded sequence, interpolated linearly between neighbouring values.
/// Uniform weights therefore give exactly [`calculate_percentile`], while
/// heavier values claim proportionally more of the range. Zero-weight values
/// do not contribute.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the lengths differ, the sequence is
/// empty, any weight is negative or non-finite, the total weight is zero
/// or overflows, or `p` is outside `[0, 100]`.
pub fn calculate_weighted_percentile(values: &[f64], weights: &[f64], p: f64) -> Result<f64> {
    check_percentile(p)?;
    if values.len() != weights.len() {
        return Err(Error::InvalidInput(format!(
            "values and weights differ in length ({} vs {})",
            values.len(),
            weights.len()
        )));
    }
    check_values(values)?;
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::InvalidInput(
            "weights must be finite and non-negative".to_string(),
        ));
    }

    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(weights)
        .filter(|(_, w)| **w > 0.0)
        .map(|(v, w)| (*v, *w))
        .collect();
    if pairs.is_empty() {
        return Err(Error::InvalidInput("total weight must be positive".to_string()));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // measured in weight, value i spans ranks [start, start + w_i - unit];
    // between the last copy of one value and the first copy of the next the
    // result interpolates
    let unit = pairs.iter().map(|(_, w)| *w).fold(f64::INFINITY, f64::min);
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if !total.is_finite() {
        return Err(Error::InvalidInput("total weight overflows".to_string()));
    }
    let rank = p / 100.0 * (total - unit);

    let mut start = 0.0;
    for (i, &(value, weight)) in pairs.iter().enumerate() {
        let last_copy = start + weight - unit;
        if rank <= last_copy {
            return Ok(value);
        }
        let Some(&(next, _)) = pairs.get(i + 1) else {
            break;
        };
        let next_start = start + weight;
        if rank < next_start {
            let fraction = ((rank - last_copy) / unit).min(1.0);
            return Ok(value + (next - value) * fraction);
        }
        start = next_start;
    }

    // rounding can leave the rank a hair past the last copy
    Ok(pairs[pairs.len() - 1].0)
}
