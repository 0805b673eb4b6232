//! Persisted sync state: fingerprints from the last run plus the version
//! counter.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::file::{atomic_write, read_optional};

/// Fingerprint pair recorded for one item at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub local_hash: String,
    pub remote_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

/// Local replica state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub items: BTreeMap<String, ItemState>,
    /// Monotonic version counter; never decreases.
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Identity of the remote this state was reconciled against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_identity: Option<String>,
}

impl SyncState {
    /// Load state; a missing file is a fresh state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match read_optional(path)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid state file {}: {e}", path.display()))),
            _ => Ok(Self::default()),
        }
    }

    /// Save state atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, &json)?;
        Ok(())
    }

    /// Fingerprints recorded for an item, if it was ever synced.
    #[must_use]
    pub fn item(&self, name: &str) -> Option<&ItemState> {
        self.items.get(name)
    }

    /// Record a terminal outcome for an item.
    pub fn record(&mut self, name: &str, local_hash: &str, remote_hash: &str, at: DateTime<Utc>) {
        self.items.insert(
            name.to_string(),
            ItemState {
                local_hash: local_hash.to_string(),
                remote_hash: remote_hash.to_string(),
                last_sync: Some(at),
            },
        );
    }

    /// Raise the version counter; lower values are ignored.
    pub fn raise_version(&mut self, version: u64) {
        self.version = self.version.max(version);
    }
}
