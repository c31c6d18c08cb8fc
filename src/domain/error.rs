//! Domain error types.

/// Top-level error type for watchtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("invalid rule {rule_id}: {reason}")]
    RuleInvalid { rule_id: String, reason: String },

    #[error("no data for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("venue error: {reason}")]
    Venue { reason: String },

    #[error("order for {ticker} rejected: {reason}")]
    OrderRejected { ticker: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config_missing(section: &str, key: &str) -> Self {
        TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// True for errors that must stop the process before the first cycle.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            TraderError::ConfigParse { .. }
                | TraderError::ConfigMissing { .. }
                | TraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Csv(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::RuleInvalid { .. } => 4,
            TraderError::DataUnavailable { .. } => 5,
            TraderError::Venue { .. } | TraderError::OrderRejected { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
