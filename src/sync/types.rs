//! Shared sync types: statuses, per-item errors and run reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::archive::ArchiveError;

/// Status of one item in one run. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Local and remote canonical content are identical.
    Synced,
    /// Only the local side changed, or the run direction favours local.
    LocalAhead,
    /// Only the remote side changed, or the run direction favours remote.
    RemoteAhead,
    /// Both sides changed and versions could not break the tie.
    Conflict,
    /// Never synced. Accepted on push like `LocalAhead`.
    New,
    /// Reading or canonicalizing the item failed.
    Error,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::LocalAhead => write!(f, "local_ahead"),
            Self::RemoteAhead => write!(f, "remote_ahead"),
            Self::Conflict => write!(f, "conflict"),
            Self::New => write!(f, "new"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Run-global verdict computed from aggregated change flags and versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Synced,
    Local,
    Remote,
    Conflict,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// What the executor did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing to do for this command.
    Unchanged,
    /// Content uploaded to the remote.
    Pushed,
    /// Remote content written locally.
    Pulled,
    /// Remote content declined; local copy kept and recorded as seen.
    KeptLocal,
    /// Eligible but nothing to transfer (empty or missing content).
    Skipped,
    /// Refused by policy (conflict without force, remote ahead on push).
    Refused,
    /// Failed with an item error.
    Failed,
    /// Would transfer; dry run.
    Planned,
}

/// Errors scoped to a single item. The run continues past them.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("conflict detected, use --force to override")]
    Conflict,

    #[error("remote is ahead, run `confsync pull` first")]
    RemoteAhead,
}

impl From<serde_json::Error> for ItemError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for item-scoped operations.
pub type ItemResult<T> = std::result::Result<T, ItemError>;

/// Per-item line of a run report.
#[derive(Debug, Serialize)]
pub struct ItemReport {
    pub name: String,
    pub status: ItemStatus,
    pub outcome: Outcome,
    pub local_hash: String,
    pub remote_hash: String,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

fn serialize_error<S: Serializer>(error: &Option<ItemError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => s.serialize_str(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// Summary of one status / push / pull run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    /// Local version counter before the run.
    pub local_version: u64,
    /// Remote version counter as read from the meta blob.
    pub remote_version: u64,
    /// Version recorded locally after the run.
    pub version_after: u64,
    pub dry_run: bool,
    pub items: Vec<ItemReport>,
}

impl RunReport {
    /// Number of items with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.items.iter().filter(|i| i.outcome == outcome).count()
    }

    /// True if any item failed or was refused.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.outcome, Outcome::Failed | Outcome::Refused))
    }

    /// Look up an item line by name.
    #[must_use]
    pub fn item(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.name == name)
    }
}
