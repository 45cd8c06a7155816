//! CSV observation source and bar file reader/writer.

use crate::domain::bar::EventBar;
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%z",
];

const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    path: PathBuf,
    time_format: Option<String>,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            time_format: None,
        }
    }

    /// Try `format` before the built-in ones when parsing `open_time`.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    fn parse_time(&self, value: &str) -> Option<NaiveDateTime> {
        parse_open_time(value, self.time_format.as_deref())
    }
}

/// Parse an `open_time` cell: custom format, common datetime layouts, stamps
/// with a UTC offset, a bare date, or integer epoch milliseconds.
pub fn parse_open_time(value: &str, custom_format: Option<&str>) -> Option<NaiveDateTime> {
    let value = value.trim();

    let formats = custom_format.into_iter().chain(TIME_FORMATS.iter().copied());
    for format in formats {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Some(t);
        }
    }

    // Offset-qualified stamps are normalised to UTC.
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.naive_utc());
    }
    for format in OFFSET_TIME_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(value, format) {
            return Some(t.naive_utc());
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.naive_utc())
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Result<usize, CusumError> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        .ok_or_else(|| CusumError::data_source(format!("missing {} column", names[0])))
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<T, CusumError>
where
    T::Err: std::fmt::Display,
{
    let raw = record
        .get(idx)
        .ok_or_else(|| CusumError::data_source(format!("line {line}: missing {name} value")))?;
    raw.trim().parse().map_err(|e| {
        CusumError::data_source(format!("line {line}: invalid {name} value '{raw}': {e}"))
    })
}

/// Prices must be finite. `f64::from_str` accepts `NaN` and `inf`.
fn parse_price(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<f64, CusumError> {
    let value: f64 = parse_field(record, idx, name, line)?;
    if !value.is_finite() {
        let raw = record.get(idx).unwrap_or_default().trim();
        return Err(CusumError::data_source(format!(
            "line {line}: invalid {name} value '{raw}'"
        )));
    }
    Ok(value)
}

impl DataPort for CsvAdapter {
    fn fetch_observations(&self) -> Result<Vec<Observation>, CusumError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            CusumError::data_source(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| CusumError::data_source(format!("CSV header error: {e}")))?
            .clone();

        let time_idx = column_index(&headers, &["open_time", "timestamp", "date"])?;
        let open_idx = column_index(&headers, &["open"])?;
        let high_idx = column_index(&headers, &["high"])?;
        let low_idx = column_index(&headers, &["low"])?;
        let close_idx = column_index(&headers, &["close"])?;

        let mut observations = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            // Header is line 1.
            let line = row + 2;
            let record =
                result.map_err(|e| CusumError::data_source(format!("CSV parse error: {e}")))?;

            let time_str = record.get(time_idx).unwrap_or_default();
            let open_time = self.parse_time(time_str).ok_or_else(|| {
                CusumError::data_source(format!("line {line}: invalid open_time '{time_str}'"))
            })?;

            observations.push(Observation {
                open_time,
                open: parse_price(&record, open_idx, "open", line)?,
                high: parse_price(&record, high_idx, "high", line)?,
                low: parse_price(&record, low_idx, "low", line)?,
                close: parse_price(&record, close_idx, "close", line)?,
            });
        }

        observations.sort_by_key(|o| o.open_time);
        Ok(observations)
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write bars with the open times of their first and last observation.
pub fn write_bars(
    path: &Path,
    observations: &[Observation],
    bars: &[EventBar],
) -> Result<(), CusumError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path).map_err(|e| {
        CusumError::data_source(format!("failed to create {}: {}", path.display(), e))
    })?;
    let to_io = |e: csv::Error| CusumError::Io(std::io::Error::other(e.to_string()));

    wtr.write_record([
        "open",
        "high",
        "low",
        "close",
        "start_idx",
        "end_idx",
        "start_time",
        "end_time",
    ])
    .map_err(to_io)?;

    let time_at = |idx: usize| {
        observations
            .get(idx)
            .map(|o| o.open_time.format(OUTPUT_TIME_FORMAT).to_string())
            .unwrap_or_default()
    };

    for bar in bars {
        wtr.write_record([
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.start_idx.to_string(),
            bar.end_idx.to_string(),
            time_at(bar.start_idx),
            time_at(bar.end_idx),
        ])
        .map_err(to_io)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Read bars previously written by [`write_bars`]. Time columns are ignored.
pub fn read_bars(path: &Path) -> Result<Vec<EventBar>, CusumError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CusumError::data_source(format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| CusumError::data_source(format!("CSV header error: {e}")))?
        .clone();

    let open_idx = column_index(&headers, &["open"])?;
    let high_idx = column_index(&headers, &["high"])?;
    let low_idx = column_index(&headers, &["low"])?;
    let close_idx = column_index(&headers, &["close"])?;
    let start_idx = column_index(&headers, &["start_idx"])?;
    let end_idx = column_index(&headers, &["end_idx"])?;

    let mut bars = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let line = row + 2;
        let record =
            result.map_err(|e| CusumError::data_source(format!("CSV parse error: {e}")))?;
        bars.push(EventBar {
            open: parse_price(&record, open_idx, "open", line)?,
            high: parse_price(&record, high_idx, "high", line)?,
            low: parse_price(&record, low_idx, "low", line)?,
            close: parse_price(&record, close_idx, "close", line)?,
            start_idx: parse_field(&record, start_idx, "start_idx", line)?,
            end_idx: parse_field(&record, end_idx, "end_idx", line)?,
        });
    }
    Ok(bars)
}
