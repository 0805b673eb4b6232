//! Remote meta blob: version counter and identity tag of the remote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::remote::RemoteSnapshot;

/// Blob key of the meta document.
pub const META_KEY: &str = "confsync.meta.json";

/// Contents of the meta blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMeta {
    #[serde(default)]
    pub version: u64,
    /// Identity tag assigned when the meta blob is first written.
    #[serde(default, alias = "repo", skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteMeta {
    /// Parse meta content. Missing or blank content is version 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] when the blob exists but is not valid meta.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| Error::Remote(format!("failed to parse sync meta: {e}")))
    }

    /// Read the meta blob out of a snapshot.
    ///
    /// # Errors
    ///
    /// See [`RemoteMeta::parse`].
    pub fn from_snapshot(snapshot: &RemoteSnapshot) -> Result<Self> {
        Self::parse(snapshot.get(META_KEY).unwrap_or_default())
    }

    /// Fresh meta with a new identity tag.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            version: 0,
            identity: Some(new_identity()),
            updated_at: None,
        }
    }

    /// True when the blob predates identity tags.
    #[must_use]
    pub const fn needs_identity(&self) -> bool {
        self.identity.is_none()
    }

    /// Meta to write at the end of a run.
    #[must_use]
    pub fn next(&self, version: u64, now: DateTime<Utc>) -> Self {
        Self {
            version,
            identity: Some(self.identity.clone().unwrap_or_else(new_identity)),
            updated_at: Some(now),
        }
    }

    /// Serialized blob content.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn new_identity() -> String {
    format!("confsync:{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_meta_is_version_zero() {
        let meta = RemoteMeta::parse("").unwrap();
        assert_eq!(meta.version, 0);
        assert!(meta.needs_identity());
    }

    #[test]
    fn test_legacy_repo_field_is_identity() {
        let meta = RemoteMeta::parse(r#"{"version":3,"repo":"https://example.com/sync"}"#).unwrap();
        assert_eq!(meta.version, 3);
        assert_eq!(meta.identity.as_deref(), Some("https://example.com/sync"));
    }

    #[test]
    fn test_next_keeps_identity() {
        let meta = RemoteMeta::fresh();
        let next = meta.next(4, Utc::now());
        assert_eq!(next.version, 4);
        assert_eq!(next.identity, meta.identity);
    }

    #[test]
    fn test_next_assigns_missing_identity() {
        let next = RemoteMeta::default().next(1, Utc::now());
        assert!(next.identity.unwrap().starts_with("confsync:"));
    }

    #[test]
    fn test_garbage_meta_is_remote_error() {
        assert!(matches!(RemoteMeta::parse("[1,2"), Err(Error::Remote(_))));
    }
}
