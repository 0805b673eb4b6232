//! JSON document helpers.
//!
//! Items that take part in filtering or structural merges are JSON objects.
//! Keys are kept in sorted order (`serde_json::Map` without
//! `preserve_order`), so re-serializing a document is deterministic and
//! canonical content hashes are stable.

use serde_json::{Map, Value};
use tracing::warn;

use super::types::{ItemError, ItemResult};

/// A top-level JSON object.
pub type Document = Map<String, Value>;

/// Parse content that must be a JSON object.
///
/// # Errors
///
/// Returns [`ItemError::Parse`] if the content is not valid JSON or the top
/// level is not an object.
pub fn parse_object(raw: &str) -> ItemResult<Document> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(ItemError::Parse(format!(
            "expected a JSON object, found {}",
            kind_of(&other)
        ))),
    }
}

/// Parse one side of a merge, treating empty or malformed input as empty.
///
/// `side` names the input in the warning so the recovery is never silent.
#[must_use]
pub fn parse_lenient(raw: &str, side: &str) -> Document {
    if raw.trim().is_empty() {
        return Document::new();
    }
    match parse_object(raw) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(side, error = %err, "Malformed document treated as empty");
            Document::new()
        }
    }
}

/// Serialize a document as pretty JSON with two-space indentation.
#[must_use]
pub fn to_pretty(doc: &Document) -> String {
    // A map of JSON values always serializes.
    serde_json::to_string_pretty(doc).unwrap_or_else(|_| String::from("{}"))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
