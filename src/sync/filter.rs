//! Top-level field filters for JSON items.

use serde::{Deserialize, Serialize};

use super::document::{self, Document};
use super::types::ItemResult;

/// Include-list XOR exclude-list of top-level keys.
///
/// Serialized as `{"include": [...]}` or `{"exclude": [...]}`, so a config
/// cannot carry both at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFilter {
    #[serde(alias = "include_fields")]
    Include(Vec<String>),
    #[serde(alias = "exclude_fields")]
    Exclude(Vec<String>),
}

impl FieldFilter {
    /// Whether a top-level key survives the filter.
    #[must_use]
    pub fn retains(&self, key: &str) -> bool {
        match self {
            Self::Include(keys) => keys.iter().any(|k| k == key),
            Self::Exclude(keys) => !keys.iter().any(|k| k == key),
        }
    }

    /// Keep only the keys this filter retains.
    #[must_use]
    pub fn apply(&self, doc: Document) -> Document {
        doc.into_iter().filter(|(k, _)| self.retains(k)).collect()
    }

    /// Filter raw JSON text and re-serialize it pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a JSON object.
    pub fn apply_str(&self, raw: &str) -> ItemResult<String> {
        let doc = document::parse_object(raw)?;
        Ok(document::to_pretty(&self.apply(doc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_keeps_only_listed_keys() {
        let filter = FieldFilter::Include(vec!["model".into(), "mcpServers".into()]);
        let out = filter
            .apply_str(r#"{"model":"opus","userID":"u-1","numStartups":9}"#)
            .unwrap();
        assert_eq!(out, "{\n  \"model\": \"opus\"\n}");
    }

    #[test]
    fn test_exclude_drops_listed_keys() {
        let filter = FieldFilter::Exclude(vec!["env".into()]);
        let out = filter
            .apply_str(r#"{"env":{"TOKEN":"t"},"theme":"dark"}"#)
            .unwrap();
        assert_eq!(out, "{\n  \"theme\": \"dark\"\n}");
    }

    #[test]
    fn test_structurally_empty_survivors() {
        let filter = FieldFilter::Include(vec!["model".into()]);
        assert_eq!(filter.apply_str(r#"{"other":1}"#).unwrap(), "{}");
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let filter = FieldFilter::Exclude(vec![]);
        assert!(filter.apply_str("{oops").is_err());
    }

    #[test]
    fn test_deserialize_legacy_field_names() {
        let filter: FieldFilter =
            serde_json::from_str(r#"{"exclude_fields":["env"]}"#).unwrap();
        assert_eq!(filter, FieldFilter::Exclude(vec!["env".into()]));
    }

    #[test]
    fn test_both_lists_rejected() {
        let parsed: Result<FieldFilter, _> =
            serde_json::from_str(r#"{"include":["a"],"exclude":["b"]}"#);
        assert!(parsed.is_err());
    }
}
