//! Core type definitions for restful-models.
//!
//! This crate defines the backend-agnostic types shared by every model:
//! - Record identifiers (numeric or textual, as REST backends use both)
//! - Page data returned by paginated endpoints, and pagination arithmetic
//! - Human readable byte sizes for transfer progress
//!
//! Record schemas belong to the consuming application, not here.

mod ids;
mod page;
mod size;

pub use ids::ItemId;
pub use page::{page_count, split_pages, PageData};
pub use size::ByteSize;

use std::time::{SystemTime, UNIX_EPOCH};

/// A loosely typed record, as returned by schemaless endpoints.
pub type DataObject = serde_json::Map<String, serde_json::Value>;

/// Default filter type of list models: field name to match value.
pub type Filter = serde_json::Map<String, serde_json::Value>;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid item id: {0}")]
    InvalidId(String),
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
