//! Error types for models.

use restful_client::ClientError;
use restful_persist::PersistError;
use std::sync::Arc;
use thiserror::Error;

use crate::validate::InvalidError;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in item and list models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend request failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Persisting or restoring model state failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Input data did not pass validation.
    #[error("invalid input:\n{0}")]
    Invalid(#[from] InvalidError),

    /// A record or filter could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background page prefetch failed; shared by every awaiting caller.
    #[error("prefetch failed: {0}")]
    Prefetch(Arc<ModelError>),
}

impl ModelError {
    /// HTTP status of the underlying failed response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ModelError::Client(e) => e.status(),
            ModelError::Prefetch(e) => e.status(),
            _ => None,
        }
    }
}
