//! Error types for the persistence layer.

use thiserror::Error;

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors that can occur while mirroring fields into a store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The key-value store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored envelope or value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A field codec rejected a value.
    #[error("codec error for `{key}`: {message}")]
    Codec { key: String, message: String },
}

impl From<rusqlite::Error> for PersistError {
    fn from(error: rusqlite::Error) -> Self {
        PersistError::Storage(error.to_string())
    }
}
