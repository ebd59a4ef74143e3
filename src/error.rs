use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

/// Why a rule could not be used for an evaluation.
///
/// Both variants are fail-open: the engine treats the package as having no rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("malformed rule for '{package_id}': {reason}")]
    Malformed { package_id: String, reason: String },

    #[error("rule lookup failed: {0}")]
    Lookup(String),
}

impl RuleError {
    pub fn malformed(package_id: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            package_id: package_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for RuleError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Lookup(e.to_string())
    }
}

/// Failure of the redirect side effect.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn redirect command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("redirect is not supported on this platform")]
    Unsupported,
}
