//! Integration tests for bar construction and validation.
//!
//! Tests cover:
//! - The worked four-observation example
//! - Determinism, continuity and partition laws over generated series
//! - Threshold monotonicity
//! - Degenerate inputs
//! - Builder/validator agreement, including the net-zero tail boundary

mod common;

use common::*;
use cusumbars::domain::bar::EventBar;
use cusumbars::domain::builder::build_bars;
use cusumbars::domain::cusum::{CusumConfig, ZeroClosePolicy};
use cusumbars::domain::error::CusumError;
use cusumbars::domain::validator::{reconstruct_bar_count, validate};
use proptest::prelude::*;

/// True when every return after the last seal is exactly zero, the one case
/// where the builder keeps a tail bar that the reconstructed count skips.
fn has_flat_tail(observations: &[Observation], bars: &[EventBar]) -> bool {
    match bars.last() {
        Some(last) if last.start_idx < last.end_idx => observations[last.start_idx..=last.end_idx]
            .windows(2)
            .all(|w| w[0].close == w[1].close),
        _ => false,
    }
}

mod worked_example {
    use super::*;

    #[test]
    fn four_observations_two_bars() {
        let obs = observations_from_closes(&[100.0, 100.6, 100.6, 99.0]);
        let cfg = CusumConfig::new(0.005);
        let bars = build_bars(&obs, &cfg).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.6);
        assert_eq!(bars[0].end_idx, 1);
        assert_eq!(bars[1].open, 100.6);
        assert_eq!(bars[1].close, 99.0);
        assert_eq!(bars[1].end_idx, 3);

        let report = validate(&obs, &bars, &cfg).unwrap();
        assert!(report.passed());
        assert_eq!(report.bar_count, 2);
    }
}

mod degenerate_inputs {
    use super::*;

    #[test]
    fn single_observation() {
        let obs = observations_from_closes(&[100.0]);
        let cfg = CusumConfig::new(0.005);
        assert!(build_bars(&obs, &cfg).unwrap().is_empty());
        assert_eq!(reconstruct_bar_count(&obs, &cfg).unwrap(), 0);
        assert!(validate(&obs, &[], &cfg).unwrap().passed());
    }

    #[test]
    fn flat_series_is_one_untriggered_bar() {
        let obs = observations_from_closes(&[50.0; 6]);
        let cfg = CusumConfig::new(0.005);
        let bars = build_bars(&obs, &cfg).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!((bars[0].start_idx, bars[0].end_idx), (0, 5));
        assert_eq!(bars[0].open, bars[0].close);

        // No drift at all, so the reconstructed count is zero.
        let report = validate(&obs, &bars, &cfg).unwrap();
        assert_eq!(report.bar_count, 0);
        assert!(!report.count_matches());
    }

    #[test]
    fn zero_close_in_source() {
        let obs = observations_from_closes(&[10.0, 0.0, 10.0, 10.5]);
        let fail = CusumConfig::new(0.01);
        assert!(matches!(
            build_bars(&obs, &fail),
            Err(CusumError::ZeroPreviousClose { index: 2 })
        ));

        let lenient = fail.with_zero_close(ZeroClosePolicy::TreatAsZero);
        let bars = build_bars(&obs, &lenient).unwrap();
        assert!(validate(&obs, &bars, &lenient).unwrap().passed());
    }
}

mod boundaries {
    use super::*;

    #[test]
    fn trigger_exactly_at_threshold() {
        // Compounded closes put the cumulative sum within rounding of 0.005.
        let closes = closes_from_returns(100.0, &[0.003, 0.002]);
        let obs = observations_from_closes(&closes);
        let cfg = CusumConfig::new(0.005);
        let count = reconstruct_bar_count(&obs, &cfg).unwrap();
        let bars = build_bars(&obs, &cfg).unwrap();
        assert_eq!(bars.len(), count);
    }

    #[test]
    fn trigger_resets_both_sides() {
        // Up fires at index 2. A further -0.004 after the reset stays short.
        let closes = closes_from_returns(100.0, &[-0.004, 0.006, -0.004]);
        let obs = observations_from_closes(&closes);
        let bars = build_bars(&obs, &CusumConfig::new(0.005)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].end_idx, 2);
        assert_eq!((bars[1].start_idx, bars[1].end_idx), (2, 3));
    }

    #[test]
    fn net_zero_tail_is_kept_by_builder_only() {
        let closes = closes_from_returns(100.0, &[0.01, 0.0, 0.0]);
        let obs = observations_from_closes(&closes);
        let cfg = CusumConfig::new(0.005);
        let bars = build_bars(&obs, &cfg).unwrap();

        let tail = bars.last().unwrap();
        assert!(tail.start_idx < tail.end_idx);
        assert!(has_flat_tail(&obs, &bars));

        let report = validate(&obs, &bars, &cfg).unwrap();
        assert_eq!(report.bar_count + 1, bars.len());
        assert_eq!(report.warnings().len(), 1);
    }
}

fn returns_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![
            4 => -0.02f64..0.02f64,
            1 => Just(0.0f64),
        ],
        1..200,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn builder_is_deterministic(returns in returns_strategy(), threshold in 0.001f64..0.05) {
        let obs = observations_from_closes(&closes_from_returns(100.0, &returns));
        let cfg = CusumConfig::new(threshold);
        prop_assert_eq!(build_bars(&obs, &cfg).unwrap(), build_bars(&obs, &cfg).unwrap());
    }

    #[test]
    fn bars_are_continuous_and_well_formed(returns in returns_strategy(), threshold in 0.001f64..0.05) {
        let obs = observations_from_closes(&closes_from_returns(100.0, &returns));
        let bars = build_bars(&obs, &CusumConfig::new(threshold)).unwrap();

        for pair in bars.windows(2) {
            // Exact: both values are the same close.
            prop_assert_eq!(pair[1].open, pair[0].close);
        }
        for bar in &bars {
            prop_assert!(bar.start_idx <= bar.end_idx);
            prop_assert!(bar.end_idx < obs.len());
            prop_assert!(bar.is_well_formed());
        }
    }

    #[test]
    fn bars_partition_the_series(returns in returns_strategy(), threshold in 0.001f64..0.05) {
        let obs = observations_from_closes(&closes_from_returns(100.0, &returns));
        let bars = build_bars(&obs, &CusumConfig::new(threshold)).unwrap();

        // At least two observations always leave at least one bar.
        prop_assert!(!bars.is_empty());
        prop_assert_eq!(bars[0].start_idx, 0);
        for pair in bars.windows(2) {
            prop_assert_eq!(pair[1].start_idx, pair[0].end_idx);
            prop_assert!(pair[0].start_idx < pair[0].end_idx);
        }
        // A dropped tail only ever follows a trigger on the final observation.
        prop_assert_eq!(bars.last().unwrap().end_idx, obs.len() - 1);
    }

    #[test]
    fn larger_threshold_never_adds_bars(
        returns in returns_strategy(),
        low in 0.001f64..0.02,
        extra in 0.0f64..0.03,
    ) {
        let obs = observations_from_closes(&closes_from_returns(100.0, &returns));
        let fine = build_bars(&obs, &CusumConfig::new(low)).unwrap();
        let coarse = build_bars(&obs, &CusumConfig::new(low + extra)).unwrap();
        prop_assert!(coarse.len() <= fine.len());
    }

    #[test]
    fn validator_agrees_with_builder(returns in returns_strategy(), threshold in 0.001f64..0.05) {
        let obs = observations_from_closes(&closes_from_returns(100.0, &returns));
        let cfg = CusumConfig::new(threshold);
        let bars = build_bars(&obs, &cfg).unwrap();

        let report = validate(&obs, &bars, &cfg).unwrap();
        prop_assert!(report.continuity);
        prop_assert!(report.ohlc);
        let expected = bars.len() - usize::from(has_flat_tail(&obs, &bars));
        prop_assert_eq!(report.bar_count, expected);
    }
}
