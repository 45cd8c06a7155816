//! Visualization sink port trait.
//!
//! Sinks only read `open, high, low, close, start_idx, end_idx` from the bars
//! and `open_time`/OHLC from the observations.

use std::path::Path;

use crate::domain::bar::EventBar;
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;

pub trait ChartPort {
    /// Original close series above, event-bar closes below.
    fn write_close_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        output_path: &Path,
    ) -> Result<(), CusumError>;

    /// Candles for the last `window` observations above, and the event bars
    /// ending in that stretch below.
    fn write_candlestick_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        window: usize,
        output_path: &Path,
    ) -> Result<(), CusumError>;
}
