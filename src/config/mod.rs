//! Configuration management.
//!
//! All persisted files live in one config directory:
//!
//! - `config.json`: remote target, policies and the item list
//! - `state.json`: fingerprints and version from the last run
//! - `token`: bearer token for the gist remote (mode 0600)
//!
//! The directory is `$CONFSYNC_HOME` when set, otherwise `~/.confsync`.

mod credentials;
mod items;
mod state;

pub use credentials::{resolve_token, save_token};
pub use items::{ItemDescriptor, ItemKind, ItemRole, default_items};
pub use state::{ItemState, SyncState};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::RemoteTarget;
use crate::sync::MergePolicy;
use crate::sync::file::{atomic_write, read_optional};

/// Environment variable overriding the config directory.
pub const HOME_ENV: &str = "CONFSYNC_HOME";

const DIR_NAME: &str = ".confsync";
/// Environment variable holding the gist token unless configured otherwise.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Home directory of the current user.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf())
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    let rest = match path {
        "~" => Some(""),
        p => p.strip_prefix("~/"),
    };
    match (rest, home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Locations of the persisted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve the config directory.
    ///
    /// Priority:
    /// 1. `CONFSYNC_HOME` environment variable
    /// 2. `~/.confsync`
    ///
    /// # Errors
    ///
    /// Returns an error if neither is available.
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var(HOME_ENV) {
            if !dir.trim().is_empty() {
                return Ok(Self::at(PathBuf::from(dir)));
            }
        }
        home_dir()
            .map(|home| Self::at(home.join(DIR_NAME)))
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))
    }

    #[must_use]
    pub const fn at(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    #[must_use]
    pub fn token_file(&self) -> PathBuf {
        self.root.join("token")
    }
}

/// What `pull` does when local changes would be overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Prompt before forcing through conflicts.
    #[default]
    Ask,
    /// Never overwrite conflicting local changes.
    Local,
    /// Always let the remote win conflicts.
    Remote,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteTarget>,
    /// Older configs name the gist directly.
    #[serde(default, skip_serializing)]
    gist_id: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env", alias = "github_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    #[serde(default = "default_items", alias = "sync_items")]
    pub items: Vec<ItemDescriptor>,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Config {
    /// Fresh config with the default items.
    #[must_use]
    pub fn new(remote: RemoteTarget) -> Self {
        Self {
            remote: Some(remote),
            gist_id: None,
            token_env: default_token_env(),
            merge_policy: MergePolicy::default(),
            conflict_strategy: ConflictStrategy::default(),
            items: default_items(),
        }
    }

    /// Load and validate `config.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the file does not exist, or
    /// [`Error::Config`] if it is malformed.
    pub fn load(paths: &Paths) -> Result<Self> {
        let path = paths.config_file();
        let raw = read_optional(&path)?.ok_or(Error::NotInitialized)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save `config.json` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, paths: &Paths) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(&paths.config_file(), &json)?;
        Ok(())
    }

    /// Remote target, including the legacy `gist_id` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no remote is configured.
    pub fn remote_target(&self) -> Result<RemoteTarget> {
        if let Some(target) = &self.remote {
            return Ok(target.clone());
        }
        match self.gist_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(RemoteTarget::Gist { id: id.to_string() }),
            _ => Err(Error::Config("no remote configured".into())),
        }
    }

    /// Items to sync, in config order.
    pub fn enabled_items(&self) -> impl Iterator<Item = &ItemDescriptor> {
        self.items.iter().filter(|i| i.enabled)
    }

    /// Enable or disable an item by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] if no item has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let available: Vec<String> = self.items.iter().map(|i| i.name.clone()).collect();
        let item = self
            .items
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::UnknownItem {
                name: name.to_string(),
                available,
            })?;
        item.enabled = enabled;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for item in &self.items {
            if !names.insert(item.name.as_str()) {
                return Err(Error::Config(format!("duplicate item name: {}", item.name)));
            }
            if item.remote_key == crate::sync::META_KEY {
                return Err(Error::Config(format!(
                    "item {} uses the reserved key {}",
                    item.name, item.remote_key
                )));
            }
            if !keys.insert(item.remote_key.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate remote key: {}",
                    item.remote_key
                )));
            }
        }
        Ok(())
    }
}
