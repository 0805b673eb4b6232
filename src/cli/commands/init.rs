//! Initialize confsync on this machine.
//!
//! Writes `config.json` pointing at a remote and makes sure the remote
//! carries a meta blob with an identity tag:
//!
//! - `--remote-dir PATH`: a plain directory, created if missing
//! - `--remote-id ID`: an existing gist
//! - neither: an existing confsync gist of the token's owner, or a new
//!   private gist
//!
//! Any previous sync state is discarded; the first run against the remote
//! classifies every item from scratch.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, DEFAULT_TOKEN_ENV, Paths, resolve_token};
use crate::error::{Error, Result};
use crate::remote::{self, GistClient, RemoteTarget};
use crate::sync::{META_KEY, RemoteMeta};

#[derive(Serialize)]
struct InitOutput {
    path: PathBuf,
    remote: RemoteTarget,
    /// A new remote was created rather than an existing one adopted.
    created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if a config exists and `force` is
/// not set, or an error if the remote cannot be reached or created.
pub fn execute(
    remote_id: Option<&str>,
    remote_dir: Option<&Path>,
    force: bool,
    json: bool,
) -> Result<()> {
    let paths = Paths::resolve()?;
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        return Err(Error::AlreadyInitialized { path: config_file });
    }
    fs::create_dir_all(paths.root())?;

    let (target, created, url) = match (remote_dir, remote_id) {
        (Some(dir), _) => {
            let created = !dir.exists();
            fs::create_dir_all(dir)?;
            let path = fs::canonicalize(dir)?;
            (RemoteTarget::Directory { path }, created, None)
        }
        (None, Some(id)) => {
            let client = GistClient::new(&token(&paths)?)?;
            client.verify(id)?;
            (RemoteTarget::Gist { id: id.to_string() }, false, None)
        }
        (None, None) => {
            let client = GistClient::new(&token(&paths)?)?;
            if let Some(id) = client.discover()? {
                info!(gist = %id, "Found existing confsync gist");
                (RemoteTarget::Gist { id }, false, None)
            } else {
                let files = BTreeMap::from([(META_KEY.to_string(), RemoteMeta::fresh().to_blob()?)]);
                let (id, url) = client.create(&files)?;
                info!(gist = %id, "Created gist");
                (RemoteTarget::Gist { id }, true, url)
            }
        }
    };

    ensure_meta(&paths, &target)?;

    let state_file = paths.state_file();
    if state_file.exists() {
        debug!(path = %state_file.display(), "Discarding previous sync state");
        fs::remove_file(&state_file)?;
    }

    Config::new(target.clone()).save(&paths)?;

    if json {
        let output = InitOutput {
            path: config_file,
            remote: target,
            created,
            url,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized confsync at {}", paths.root().display());
        let verb = if created { "Created" } else { "Using" };
        println!("  {verb} remote: {target}");
        if let Some(url) = url {
            println!("  {url}");
        }
        println!();
        println!("Next: `confsync push` to upload this machine's config,");
        println!("      or `confsync pull` on a machine joining an existing remote.");
    }

    Ok(())
}

fn token(paths: &Paths) -> Result<String> {
    resolve_token(DEFAULT_TOKEN_ENV, &paths.token_file())
}

/// Tag a remote that has no meta blob yet.
fn ensure_meta(paths: &Paths, target: &RemoteTarget) -> Result<()> {
    let store = remote::open(target, || token(paths))?;
    let snapshot = store.fetch()?;
    if snapshot.contains(META_KEY) {
        return Ok(());
    }
    let blob = RemoteMeta::fresh().to_blob()?;
    store.update(&BTreeMap::from([(META_KEY.to_string(), blob)]))
}
