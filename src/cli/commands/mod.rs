//! Command implementations.

pub mod completions;
pub mod config;
pub mod init;
pub mod login;
pub mod mcp_apply;
pub mod pull;
pub mod push;
pub mod status;
pub mod version;

use crate::config::{Config, ItemDescriptor, Paths, resolve_token};
use crate::error::Result;
use crate::remote::{self, RemoteStore};
use crate::sync::Engine;

/// Everything a sync command needs: loaded config, enabled items and an
/// open remote.
pub(crate) struct Workspace {
    pub paths: Paths,
    pub config: Config,
    pub items: Vec<ItemDescriptor>,
    pub remote: Box<dyn RemoteStore>,
}

impl Workspace {
    /// Load the config and open its remote.
    pub fn open() -> Result<Self> {
        let paths = Paths::resolve()?;
        let config = Config::load(&paths)?;
        let target = config.remote_target()?;
        let remote = remote::open(&target, || {
            resolve_token(&config.token_env, &paths.token_file())
        })?;
        let items = config.enabled_items().cloned().collect();
        Ok(Self {
            paths,
            config,
            items,
            remote,
        })
    }

    pub fn engine(&self) -> Result<Engine<'_>> {
        Engine::new(&self.items, self.remote.as_ref(), self.paths.state_file())
    }
}
