//! Domain error types.

/// Top-level error type for cusumbars.
#[derive(Debug, thiserror::Error)]
pub enum CusumError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no observations in {source_name}")]
    NoData { source_name: String },

    #[error("zero previous close at index {index}: return is undefined")]
    ZeroPreviousClose { index: usize },

    #[error("non-finite return at index {index}")]
    NonFiniteReturn { index: usize },

    #[error("gap before bar {index}: open {open} != previous close {prev_close}")]
    Discontinuity {
        index: usize,
        open: f64,
        prev_close: f64,
    },

    #[error("malformed bar {index}: open={open} high={high} low={low} close={close}")]
    MalformedBar {
        index: usize,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CusumError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        CusumError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn data_source(reason: impl Into<String>) -> Self {
        CusumError::DataSource {
            reason: reason.into(),
        }
    }
}

impl From<&CusumError> for std::process::ExitCode {
    fn from(err: &CusumError) -> Self {
        let code: u8 = match err {
            CusumError::Io(_) => 1,
            CusumError::ConfigParse { .. }
            | CusumError::ConfigMissing { .. }
            | CusumError::ConfigInvalid { .. } => 2,
            CusumError::DataSource { .. } => 3,
            CusumError::NoData { .. }
            | CusumError::ZeroPreviousClose { .. }
            | CusumError::NonFiniteReturn { .. } => 5,
            CusumError::Discontinuity { .. } | CusumError::MalformedBar { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
