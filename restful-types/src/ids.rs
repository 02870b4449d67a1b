//! Record identifiers.
//!
//! REST backends key records by integers (SQL serials) or strings
//! (UUIDs, slugs, Strapi document ids), so `ItemId` accepts both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Identifier of a single record in a REST resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl ItemId {
    /// Reads an identifier out of a JSON value.
    ///
    /// Integers and strings qualify; anything else (null, objects,
    /// floats) has no identity.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Returns the identifier as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Reads the identifier stored under `index_key` of a serializable record.
    pub fn of<T: Serialize>(record: &T, index_key: &str) -> Option<Self> {
        let value = serde_json::to_value(record).ok()?;
        value.get(index_key).and_then(Self::from_value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for ItemId {
    type Err = Error;

    /// Digit-only strings become numbers, everything else stays text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::InvalidId("empty id".to_string()));
        }
        Ok(s.parse::<i64>()
            .map(Self::Number)
            .unwrap_or_else(|_| Self::Text(s.to_string())))
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for ItemId {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for ItemId {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
