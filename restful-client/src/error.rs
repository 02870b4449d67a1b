//! Error types for the HTTP transport.

use serde_json::Value;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to a REST backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request path could not be turned into a URL.
    #[error("invalid URI: {0}")]
    InvalidUri(String),
}

impl ClientError {
    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Builds an HTTP error from a failed response body.
    pub fn from_response(status: u16, text: &str) -> Self {
        let body = serde_json::from_str::<Value>(text).ok();
        let message = body
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| text.trim().to_string());

        ClientError::Http {
            status,
            message,
            body,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            ClientError::InvalidUri(error.to_string())
        } else {
            ClientError::Network(error.to_string())
        }
    }
}

/// Pulls a human readable message out of a JSON error body.
///
/// Strapi v3 nests validation messages as `data[].messages[]` objects,
/// which are flattened into `key: value` lines.
fn error_message(body: &Value) -> Option<String> {
    let details: Vec<String> = body
        .get("data")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|detail| detail.get("messages").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
        .flat_map(|message| {
            message.iter().map(|(key, value)| match value {
                Value::String(text) => format!("{key}: {text}"),
                other => format!("{key}: {other}"),
            })
        })
        .collect();

    if !details.is_empty() {
        return Some(details.join("\n"));
    }

    ["message", "error"].iter().find_map(|key| match body.get(*key)? {
        Value::String(text) => Some(text.clone()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}
