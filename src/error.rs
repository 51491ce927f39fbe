use thiserror::Error;

/// Errors surfaced by the offline core itself.
///
/// Remote-API outcomes (transport failure vs application rejection) are a
/// separate taxonomy, see [`crate::api::ApiError`]; this enum covers local
/// storage, configuration and serialization problems, plus a wrapper for
/// rejections that bubble out of a read path.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Persistent store (SQLite) errors
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mutex poison error
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Remote rejection surfaced through a read path
    #[error("API error: {0}")]
    Api(#[from] crate::api::ApiError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn lock(what: &str) -> Self {
        CoreError::LockPoisoned(what.to_string())
    }
}
