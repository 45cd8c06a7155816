#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use cusumbars::domain::bar::EventBar;
use cusumbars::domain::error::CusumError;
pub use cusumbars::domain::observation::Observation;
use cusumbars::ports::chart_port::ChartPort;
use cusumbars::ports::data_port::DataPort;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub observations: Vec<Observation>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            observations: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_observations(&self) -> Result<Vec<Observation>, CusumError> {
        if let Some(reason) = &self.error {
            return Err(CusumError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.observations.clone())
    }

    fn source_name(&self) -> String {
        "mock".to_string()
    }
}

/// Chart sink that only records what it was asked to draw.
#[derive(Default)]
pub struct RecordingChartPort {
    pub line_calls: RefCell<Vec<(usize, usize, PathBuf)>>,
    pub candle_calls: RefCell<Vec<(usize, usize, usize, PathBuf)>>,
}

impl ChartPort for RecordingChartPort {
    fn write_close_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        output_path: &Path,
    ) -> Result<(), CusumError> {
        self.line_calls
            .borrow_mut()
            .push((observations.len(), bars.len(), output_path.to_path_buf()));
        Ok(())
    }

    fn write_candlestick_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        window: usize,
        output_path: &Path,
    ) -> Result<(), CusumError> {
        self.candle_calls.borrow_mut().push((
            observations.len(),
            bars.len(),
            window,
            output_path.to_path_buf(),
        ));
        Ok(())
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One-minute observations with a small wick around each close.
pub fn observations_from_closes(closes: &[f64]) -> Vec<Observation> {
    let start = start_time();
    let mut prev = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Observation {
                open_time: start + Duration::minutes(i as i64),
                open,
                high: open.max(close) * 1.001,
                low: open.min(close) * 0.999,
                close,
            }
        })
        .collect()
}

/// Compound a start price through a list of fractional returns.
pub fn closes_from_returns(start_price: f64, returns: &[f64]) -> Vec<f64> {
    let mut closes = Vec::with_capacity(returns.len() + 1);
    closes.push(start_price);
    for r in returns {
        let last = *closes.last().unwrap();
        closes.push(last * (1.0 + r));
    }
    closes
}

pub fn observations_csv(observations: &[Observation]) -> String {
    let mut out = String::from("open_time,open,high,low,close,volume\n");
    for o in observations {
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            o.open_time.format("%Y-%m-%d %H:%M:%S"),
            o.open,
            o.high,
            o.low,
            o.close
        ));
    }
    out
}
