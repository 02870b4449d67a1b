//! Bracket-notation query strings.

use serde_json::Value;

/// Flattens a JSON object into `a[b][0]` keyed pairs, unencoded.
///
/// Nested objects and arrays expand into bracketed keys, `null` becomes an
/// empty value, and empty objects or arrays produce nothing. Non-objects
/// produce no pairs.
pub fn pairs(value: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    if let Value::Object(fields) = value {
        for (key, value) in fields {
            collect(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

fn collect(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(fields) => {
            for (key, value) in fields {
                collect(format!("{prefix}[{key}]"), value, pairs);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                collect(format!("{prefix}[{index}]"), value, pairs);
            }
        }
        Value::Null => pairs.push((prefix, String::new())),
        Value::String(text) => pairs.push((prefix, text.clone())),
        other => pairs.push((prefix, other.to_string())),
    }
}
