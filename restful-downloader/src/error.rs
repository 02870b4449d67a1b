//! Error types for download tasks.

use restful_client::ClientError;
use restful_persist::PersistError;
use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while managing or running downloads.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No transport handles the URI's scheme.
    #[error("protocol \"{0}\" has not been registered")]
    UnregisteredProtocol(String),

    /// No task carries the given name.
    #[error("{0} isn't found")]
    NotFound(String),

    #[error("invalid URI {uri}: {message}")]
    InvalidUri { uri: String, message: String },

    /// Writing the target file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
