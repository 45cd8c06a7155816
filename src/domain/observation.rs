//! Fixed-interval OHLC observation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub open_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Observation {
    /// (close[i] - prev_close) / prev_close, or `None` when prev_close is zero.
    pub fn simple_return(&self, prev_close: f64) -> Option<f64> {
        if prev_close == 0.0 {
            None
        } else {
            Some((self.close - prev_close) / prev_close)
        }
    }

    /// close >= open
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}
