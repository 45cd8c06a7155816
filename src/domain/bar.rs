//! Event bars and the live accumulator that seals into them.

use crate::domain::observation::Observation;

/// A sealed, variable-duration bar spanning `start_idx..=end_idx` of the
/// source observations.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub start_idx: usize,
    pub end_idx: usize,
}

impl EventBar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Number of source observations covered, seed included.
    pub fn span(&self) -> usize {
        self.end_idx - self.start_idx + 1
    }

    /// high >= max(open, close) and low <= min(open, close)
    pub fn is_well_formed(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

/// The single in-progress bar owned by a builder run.
#[derive(Debug, Clone, PartialEq)]
pub struct BarAccumulator {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    start_idx: usize,
    end_idx: usize,
}

impl BarAccumulator {
    /// Seed from the full OHLC of an observation.
    pub fn from_observation(obs: &Observation, idx: usize) -> Self {
        Self {
            open: obs.open,
            high: obs.high,
            low: obs.low,
            close: obs.close,
            start_idx: idx,
            end_idx: idx,
        }
    }

    /// Seed at a single price; used after a trigger with the triggering close.
    pub fn from_price(price: f64, idx: usize) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            start_idx: idx,
            end_idx: idx,
        }
    }

    pub fn extend(&mut self, obs: &Observation, idx: usize) {
        self.high = self.high.max(obs.high);
        self.low = self.low.min(obs.low);
        self.close = obs.close;
        self.end_idx = idx;
    }

    /// True once at least one observation beyond the seed has been folded in.
    pub fn has_advanced(&self) -> bool {
        self.start_idx < self.end_idx
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn seal(self) -> EventBar {
        EventBar {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            start_idx: self.start_idx,
            end_idx: self.end_idx,
        }
    }
}
