//! Remote document store.
//!
//! The engine sees the remote as a flat map of blob key to content, read
//! once per run with [`RemoteStore::fetch`] and written with one partial
//! [`RemoteStore::update`]. Two stores exist:
//!
//! - [`GistRemote`]: a GitHub gist, one gist file per blob
//! - [`DirRemote`]: a plain directory, one file per blob

mod dir;
mod gist;

pub use dir::DirRemote;
pub use gist::{GistClient, GistRemote};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Blob contents of the remote at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    blobs: BTreeMap<String, String>,
}

impl RemoteSnapshot {
    #[must_use]
    pub const fn new(blobs: BTreeMap<String, String>) -> Self {
        Self { blobs }
    }

    /// Content of a blob, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.blobs.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }

    /// Blob keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }
}

/// Remote blob store.
pub trait RemoteStore {
    /// Read every blob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Remote`] if the remote cannot be reached.
    fn fetch(&self) -> Result<RemoteSnapshot>;

    /// Write the given blobs, leaving others untouched. Empty content
    /// deletes the blob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Remote`] if the update is rejected.
    fn update(&self, blobs: &BTreeMap<String, String>) -> Result<()>;

    /// Human readable location, for status output.
    fn describe(&self) -> String;
}

/// Where the remote lives, as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteTarget {
    Gist { id: String },
    Directory { path: PathBuf },
}

impl std::fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gist { id } => write!(f, "gist {id}"),
            Self::Directory { path } => write!(f, "directory {}", path.display()),
        }
    }
}

/// Open the store for a target. `token` is only consulted for gists.
///
/// # Errors
///
/// Returns an error if a gist target has no token, or the HTTP client
/// cannot be built.
pub fn open(
    target: &RemoteTarget,
    token: impl FnOnce() -> Result<String>,
) -> Result<Box<dyn RemoteStore>> {
    match target {
        RemoteTarget::Gist { id } => {
            let client = GistClient::new(&token()?)?;
            Ok(Box::new(GistRemote::new(client, id)))
        }
        RemoteTarget::Directory { path } => Ok(Box::new(DirRemote::new(path.clone()))),
    }
}
