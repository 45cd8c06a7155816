//! Configuration validation.
//!
//! Validates all config fields before a conversion runs.

use crate::domain::cusum::ZeroClosePolicy;
use crate::domain::error::CusumError;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), CusumError> {
    validate_cusum_config(config)?;
    validate_input(config)?;
    validate_output(config)?;
    Ok(())
}

pub fn validate_cusum_config(config: &dyn ConfigPort) -> Result<(), CusumError> {
    validate_threshold(config)?;
    validate_zero_close(config)?;
    Ok(())
}

fn validate_threshold(config: &dyn ConfigPort) -> Result<(), CusumError> {
    let raw = config
        .get_string("cusum", "threshold")
        .ok_or_else(|| CusumError::ConfigMissing {
            section: "cusum".to_string(),
            key: "threshold".to_string(),
        })?;
    let value: f64 = raw.trim().parse().map_err(|_| {
        CusumError::config_invalid("cusum", "threshold", format!("'{raw}' is not a number"))
    })?;
    check_threshold(value)
}

/// A threshold must be a finite fraction strictly between 0 and 1.
pub fn check_threshold(value: f64) -> Result<(), CusumError> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(CusumError::config_invalid(
            "cusum",
            "threshold",
            "threshold must be between 0 and 1 (exclusive)",
        ));
    }
    Ok(())
}

fn validate_zero_close(config: &dyn ConfigPort) -> Result<(), CusumError> {
    match config.get_string("cusum", "zero_close") {
        None => Ok(()),
        Some(s) => s
            .parse::<ZeroClosePolicy>()
            .map(|_| ())
            .map_err(|reason| CusumError::config_invalid("cusum", "zero_close", reason)),
    }
}

fn validate_input(config: &dyn ConfigPort) -> Result<(), CusumError> {
    if let Some(path) = config.get_string("input", "path") {
        if path.trim().is_empty() {
            return Err(CusumError::config_invalid("input", "path", "path must not be empty"));
        }
    }
    if let Some(format) = config.get_string("input", "time_format") {
        if format.trim().is_empty() {
            return Err(CusumError::config_invalid(
                "input",
                "time_format",
                "time_format must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_output(config: &dyn ConfigPort) -> Result<(), CusumError> {
    let candles = config.get_int("output", "candles", 1000);
    if candles <= 0 {
        return Err(CusumError::config_invalid(
            "output",
            "candles",
            "candles must be positive",
        ));
    }
    Ok(())
}
