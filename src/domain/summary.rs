//! Run summary and chart window selection.

use crate::domain::bar::EventBar;

#[derive(Debug, Clone, PartialEq)]
pub struct BarSummary {
    pub observations: usize,
    pub bars: usize,
    pub bullish: usize,
    pub bearish: usize,
    /// Mean number of observations per bar, seed included.
    pub mean_span: f64,
    pub compression_ratio: Option<f64>,
}

impl BarSummary {
    pub fn compute(observation_count: usize, bars: &[EventBar]) -> Self {
        let bullish = bars.iter().filter(|b| b.is_bullish()).count();
        let mean_span = if bars.is_empty() {
            0.0
        } else {
            bars.iter().map(EventBar::span).sum::<usize>() as f64 / bars.len() as f64
        };

        Self {
            observations: observation_count,
            bars: bars.len(),
            bullish,
            bearish: bars.len() - bullish,
            mean_span,
            compression_ratio: compression_ratio(observation_count, bars.len()),
        }
    }
}

/// observations / bars; `None` when there are no bars.
pub fn compression_ratio(observation_count: usize, bar_count: usize) -> Option<f64> {
    if bar_count == 0 {
        None
    } else {
        Some(observation_count as f64 / bar_count as f64)
    }
}

/// Bars that end inside the last `window` observations of a series of
/// `observation_count`.
pub fn bars_in_window(bars: &[EventBar], observation_count: usize, window: usize) -> &[EventBar] {
    let cutoff = observation_count.saturating_sub(window);
    // Bars are ordered by end_idx, so the matching ones form a suffix.
    let first = bars.partition_point(|b| b.end_idx < cutoff);
    &bars[first..]
}
