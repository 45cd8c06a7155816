//! Self-consistency checks for an event-bar series.
//!
//! Continuity and OHLC shape are hard failures. The bar count is re-derived
//! from the observations alone, without looking at the candidate bars, and a
//! disagreement is only reported as a warning.

use approx::relative_eq;

use crate::domain::bar::EventBar;
use crate::domain::cusum::{CusumConfig, CusumFilter};
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;

/// Absolute part of the "close enough" comparison used for continuity.
pub const CONTINUITY_ABS_TOL: f64 = 1e-8;
/// Relative part of the "close enough" comparison used for continuity.
pub const CONTINUITY_REL_TOL: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub continuity: bool,
    pub ohlc: bool,
    /// Bar count re-derived from the observations.
    pub bar_count: usize,
    pub candidate_count: usize,
}

impl ValidationReport {
    pub fn count_matches(&self) -> bool {
        self.bar_count == self.candidate_count
    }

    pub fn passed(&self) -> bool {
        self.continuity && self.ohlc && self.count_matches()
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.count_matches() {
            warnings.push(format!(
                "bar count mismatch: expected {}, got {}",
                self.candidate_count, self.bar_count
            ));
        }
        warnings
    }
}

/// Run all three checks. Fatal failures return early as errors.
pub fn validate(
    observations: &[Observation],
    bars: &[EventBar],
    config: &CusumConfig,
) -> Result<ValidationReport, CusumError> {
    check_continuity(bars)?;
    check_ohlc(bars)?;
    let bar_count = reconstruct_bar_count(observations, config)?;

    let report = ValidationReport {
        continuity: true,
        ohlc: true,
        bar_count,
        candidate_count: bars.len(),
    };

    if report.count_matches() {
        tracing::info!(bars = bar_count, "bar count validation passed");
    } else {
        tracing::warn!(
            expected = report.candidate_count,
            reconstructed = bar_count,
            "bar count mismatch"
        );
    }
    Ok(report)
}

/// `bar[k].open` must be close to `bar[k-1].close` for every k >= 1.
pub fn check_continuity(bars: &[EventBar]) -> Result<(), CusumError> {
    for (k, pair) in bars.windows(2).enumerate() {
        let (prev, bar) = (&pair[0], &pair[1]);
        if !is_close(bar.open, prev.close) {
            return Err(CusumError::Discontinuity {
                index: k + 1,
                open: bar.open,
                prev_close: prev.close,
            });
        }
    }
    Ok(())
}

/// Every bar must have `high >= max(open, close)` and `low <= min(open, close)`.
pub fn check_ohlc(bars: &[EventBar]) -> Result<(), CusumError> {
    match bars.iter().position(|b| !b.is_well_formed()) {
        None => Ok(()),
        Some(index) => {
            let b = &bars[index];
            Err(CusumError::MalformedBar {
                index,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
            })
        }
    }
}

/// Count filter triggers over the observations, plus one for any residual
/// drift left at the end.
///
/// The residual rule looks at the filter, not at whether the tail advanced,
/// so a tail whose returns net to exactly zero is not counted here even
/// though the builder keeps it.
pub fn reconstruct_bar_count(
    observations: &[Observation],
    config: &CusumConfig,
) -> Result<usize, CusumError> {
    let mut filter = CusumFilter::new();
    let mut count = 0;

    for (k, pair) in observations.windows(2).enumerate() {
        let ret = config.step_return(&pair[0], &pair[1], k + 1)?;
        if filter.update(ret, config.threshold) {
            count += 1;
            filter.reset();
        }
    }

    if filter.has_residual() {
        count += 1;
    }
    Ok(count)
}

fn is_close(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = CONTINUITY_ABS_TOL, max_relative = CONTINUITY_REL_TOL)
}
