//! Input validation.

use std::collections::BTreeMap;
use thiserror::Error;

/// Failed constraints per property: `property -> constraint -> message`.
pub type InvalidMessage = BTreeMap<String, BTreeMap<String, String>>;

/// Data that can check its own constraints before being sent.
pub trait Validate {
    fn validate(&self) -> Result<(), InvalidMessage>;
}

/// Collects constraint failures while validating one value.
///
/// ```
/// use restful_model::{InvalidMessage, Validate, Violations};
///
/// struct User {
///     email: String,
/// }
///
/// impl Validate for User {
///     fn validate(&self) -> Result<(), InvalidMessage> {
///         Violations::default()
///             .check("email", "isEmail", self.email.contains('@'), "email must be an email")
///             .finish()
///     }
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct Violations(InvalidMessage);

impl Violations {
    /// Records `message` under `property`/`constraint` unless `valid`.
    #[must_use]
    pub fn check(
        mut self,
        property: &str,
        constraint: &str,
        valid: bool,
        message: impl Into<String>,
    ) -> Self {
        if !valid {
            self.0
                .entry(property.to_string())
                .or_default()
                .insert(constraint.to_string(), message.into());
        }
        self
    }

    pub fn finish(self) -> Result<(), InvalidMessage> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

/// Validation failure carrying every failed constraint.
///
/// Displays one `property: message, message` line per property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.fields))]
pub struct InvalidError {
    pub fields: InvalidMessage,
}

impl From<InvalidMessage> for InvalidError {
    fn from(fields: InvalidMessage) -> Self {
        Self { fields }
    }
}

fn describe(fields: &InvalidMessage) -> String {
    fields
        .iter()
        .map(|(key, constraints)| {
            let messages: Vec<&str> = constraints.values().map(String::as_str).collect();
            format!("{key}: {}", messages.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
