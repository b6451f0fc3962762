//! Domain error types.

/// Top-level error type for momotrader.
#[derive(Debug, thiserror::Error)]
pub enum MomotraderError {
    #[error("data integrity error for {symbol}: {reason}")]
    DataIntegrity { symbol: String, reason: String },

    #[error("missing column {column} for {symbol}")]
    MissingColumn { symbol: String, column: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("csv error: {reason}")]
    Csv { reason: String },

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

    #[error("conflicting configuration: {reason}")]
    ConfigConflict { reason: String },

    #[error("unknown parameter: {key}")]
    UnknownParameter { key: String },

    #[error("invalid parameter set {input:?}: {reason}")]
    InvalidParameterSet { input: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MomotraderError {
    pub fn integrity(symbol: &str, reason: impl Into<String>) -> Self {
        MomotraderError::DataIntegrity {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        MomotraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for MomotraderError {
    fn from(err: csv::Error) -> Self {
        MomotraderError::Csv {
            reason: err.to_string(),
        }
    }
}

impl From<&MomotraderError> for std::process::ExitCode {
    fn from(err: &MomotraderError) -> Self {
        let code: u8 = match err {
            MomotraderError::Io(_) | MomotraderError::Csv { .. } => 1,
            MomotraderError::ConfigParse { .. }
            | MomotraderError::ConfigMissing { .. }
            | MomotraderError::ConfigInvalid { .. }
            | MomotraderError::ConfigConflict { .. } => 2,
            MomotraderError::DataIntegrity { .. } | MomotraderError::MissingColumn { .. } => 3,
            MomotraderError::UnknownParameter { .. }
            | MomotraderError::InvalidParameterSet { .. } => 4,
            MomotraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
