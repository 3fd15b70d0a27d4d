//! Domain error types.

/// Top-level error type for stockledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
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

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("insufficient holdings of {symbol}: hold {held}, asked to sell {requested}")]
    InsufficientHoldings {
        symbol: String,
        held: f64,
        requested: f64,
    },

    #[error("no user with id {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("no user named {username:?}")]
    UnknownUsername { username: String },

    #[error("no portfolio with id {portfolio_id}")]
    PortfolioNotFound { portfolio_id: i64 },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => 3,
            LedgerError::InvalidInput { .. } | LedgerError::InsufficientHoldings { .. } => 4,
            LedgerError::UserNotFound { .. }
            | LedgerError::UnknownUsername { .. }
            | LedgerError::PortfolioNotFound { .. } => 5,
            LedgerError::Serialization { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
