use rmload_shared::IngestError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Stored or outgoing document body is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document body exceeds the per-document size limit.
    #[error("Document too large: {size} bytes (max {max})")]
    DocumentTooLarge { size: usize, max: usize },

    /// A previous writer panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    LockPoisoned,

    /// The blocking write task was cancelled or panicked.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            StoreError::DocumentTooLarge { .. } | StoreError::Json(_) => {
                IngestError::RemoteRejected(err.to_string())
            }
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if matches!(
                    failure.code,
                    ErrorCode::ConstraintViolation | ErrorCode::TooBig | ErrorCode::TypeMismatch
                ) =>
            {
                IngestError::RemoteRejected(err.to_string())
            }
            StoreError::NotFound => IngestError::NotFound(err.to_string()),
            _ => IngestError::TransientIo(err.to_string()),
        }
    }
}
