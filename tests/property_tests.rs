//! Property-based tests for llmtrace-optimizer
//!
//! - Test statistical invariants of the percentile and decay functions
//! - Test the improvement rule and field override semantics
//! - Run with ProptestConfig::with_cases(100)

use chrono::{Duration, TimeZone, Utc};
use llmtrace_optimizer::optimizer::is_improvement;
use llmtrace_optimizer::stats::{
    calculate_percentile, calculate_time_decay_weight, calculate_weighted_percentile,
};
use llmtrace_optimizer::task::{FieldOverrides, ModelConfig, MutableField, MutableFieldSet};
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Non-empty sample of finite values
fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-1.0e6f64..1.0e6, 1..50)
}

/// Values with matching positive weights
fn arb_weighted() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..40).prop_flat_map(|n| {
        (
            proptest::collection::vec(-1.0e3f64..1.0e3, n),
            proptest::collection::vec(0.01f64..100.0, n),
        )
    })
}

fn arb_overrides() -> impl Strategy<Value = FieldOverrides> {
    (
        proptest::option::of("[a-z]{1,12}"),
        proptest::option::of("[a-z]{1,8}"),
        proptest::option::of(0.0f64..2.0),
        proptest::option::of(1u32..4096),
    )
        .prop_map(|(prompt, model, temperature, max_output_tokens)| FieldOverrides {
            prompt,
            model,
            temperature,
            max_output_tokens,
        })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Percentiles
    // ========================================================================

    /// Property: percentile lies within [min, max]
    #[test]
    fn prop_percentile_within_range(values in arb_values(), p in 0.0f64..=100.0) {
        let result = calculate_percentile(&values, p).unwrap();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(result >= min - 1e-6 && result <= max + 1e-6);
    }

    /// Property: percentile is non-decreasing in p
    #[test]
    fn prop_percentile_monotonic(values in arb_values(), a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = calculate_percentile(&values, lo).unwrap();
        let high = calculate_percentile(&values, hi).unwrap();
        prop_assert!(low <= high + 1e-6, "p{} = {} > p{} = {}", lo, low, hi, high);
    }

    /// Property: input order does not matter
    #[test]
    fn prop_percentile_order_independent(values in arb_values(), p in 0.0f64..=100.0) {
        let mut reversed = values.clone();
        reversed.reverse();
        let a = calculate_percentile(&values, p).unwrap();
        let b = calculate_percentile(&reversed, p).unwrap();
        prop_assert!((a - b).abs() < 1e-9);
    }

    /// Property: weighted percentile lies within [min, max] and is monotonic
    #[test]
    fn prop_weighted_percentile_bounded_and_monotonic(
        (values, weights) in arb_weighted(),
        a in 0.0f64..=100.0,
        b in 0.0f64..=100.0,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = calculate_weighted_percentile(&values, &weights, lo).unwrap();
        let high = calculate_weighted_percentile(&values, &weights, hi).unwrap();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(low >= min - 1e-6 && high <= max + 1e-6);
        prop_assert!(low <= high + 1e-6);
    }

    /// Property: uniform weights reproduce the unweighted percentile
    #[test]
    fn prop_weighted_percentile_uniform_matches_unweighted(
        values in arb_values(),
        weight in 0.01f64..100.0,
        p in 0.0f64..=100.0,
    ) {
        let weights = vec![weight; values.len()];
        let weighted = calculate_weighted_percentile(&values, &weights, p).unwrap();
        let unweighted = calculate_percentile(&values, p).unwrap();
        let span = values.iter().copied().fold(0.0f64, |acc, v| acc.max(v.abs()));
        prop_assert!(
            (weighted - unweighted).abs() <= 1e-9 * span.max(1.0),
            "p{}: weighted {} vs unweighted {}", p, weighted, unweighted
        );
    }

    /// Property: scaling all weights leaves the weighted percentile unchanged
    #[test]
    fn prop_weighted_percentile_scale_invariant(
        (values, weights) in arb_weighted(),
        scale in 0.1f64..10.0,
        p in 0.0f64..=100.0,
    ) {
        let scaled: Vec<f64> = weights.iter().map(|w| w * scale).collect();
        let a = calculate_weighted_percentile(&values, &weights, p).unwrap();
        let b = calculate_weighted_percentile(&values, &scaled, p).unwrap();
        prop_assert!((a - b).abs() < 1e-6);
    }

    // ========================================================================
    // Time decay
    // ========================================================================

    /// Property: decay weight is in (0, 1] and shrinks with age
    #[test]
    fn prop_decay_weight_bounded_and_decreasing(
        age_a in 0i64..10_000_000,
        age_b in 0i64..10_000_000,
        half_life in 1i64..1_000_000,
    ) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let half_life = Duration::milliseconds(half_life);
        let (young, old) = if age_a <= age_b { (age_a, age_b) } else { (age_b, age_a) };

        let w_young =
            calculate_time_decay_weight(now - Duration::milliseconds(young), now, half_life).unwrap();
        let w_old =
            calculate_time_decay_weight(now - Duration::milliseconds(old), now, half_life).unwrap();

        prop_assert!(w_young > 0.0 && w_young <= 1.0);
        prop_assert!(w_old > 0.0 && w_old <= 1.0);
        prop_assert!(w_old <= w_young);
    }

    // ========================================================================
    // Improvement rule
    // ========================================================================

    /// Property: without a best score, every score improves
    #[test]
    fn prop_anything_beats_missing_best(score in 0.0f64..=1.0, threshold in proptest::option::of(0.0f64..1.0)) {
        prop_assert!(is_improvement(None, score, threshold));
    }

    /// Property: an improvement is strictly better and clears the threshold
    #[test]
    fn prop_improvement_implies_gain(
        best in 0.0f64..=1.0,
        score in 0.0f64..=1.0,
        threshold in 0.0f64..0.5,
    ) {
        if is_improvement(Some(best), score, Some(threshold)) {
            prop_assert!(score > best);
            prop_assert!(score - best >= threshold - 1e-6);
        }
        prop_assert!(!is_improvement(Some(best), best, Some(threshold)));
    }

    // ========================================================================
    // Field overrides
    // ========================================================================

    /// Property: applying overrides changes only the overridden fields
    #[test]
    fn prop_apply_touches_only_overridden_fields(overrides in arb_overrides()) {
        let base = ModelConfig::new("base prompt", "base-model", 0.5, 256);
        let applied = overrides.apply(&base);

        prop_assert_eq!(&applied.prompt, overrides.prompt.as_ref().unwrap_or(&base.prompt));
        prop_assert_eq!(&applied.model, overrides.model.as_ref().unwrap_or(&base.model));
        prop_assert_eq!(applied.temperature, overrides.temperature.unwrap_or(base.temperature));
        prop_assert_eq!(
            applied.max_output_tokens,
            overrides.max_output_tokens.unwrap_or(base.max_output_tokens)
        );
    }

    /// Property: overrides are confined to exactly the fields they set
    #[test]
    fn prop_overrides_confined_to_own_fields(overrides in arb_overrides()) {
        let fields = overrides.fields();
        if fields.is_empty() {
            prop_assert!(overrides.is_empty());
        } else {
            let own = MutableFieldSet::new(fields.iter().copied()).unwrap();
            prop_assert!(overrides.is_confined_to(&own));
            let all = MutableFieldSet::new(MutableField::ALL).unwrap();
            prop_assert!(overrides.is_confined_to(&all));
        }
    }
}
