//! Directory-backed remote: one file per blob.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{RemoteSnapshot, RemoteStore};
use crate::error::{Error, Result};
use crate::sync::file::atomic_write;

/// Remote stored in a local (possibly shared or mounted) directory.
#[derive(Debug, Clone)]
pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && key != "..";
        if !valid {
            return Err(Error::Remote(format!("invalid blob key: {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

fn remote_io(context: &str, err: &io::Error) -> Error {
    Error::Remote(format!("{context}: {err}"))
}

impl RemoteStore for DirRemote {
    fn fetch(&self) -> Result<RemoteSnapshot> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            remote_io(&format!("cannot read remote directory {}", self.root.display()), &e)
        })?;

        let mut blobs = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| remote_io("cannot list remote directory", &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            let content = fs::read_to_string(entry.path())
                .map_err(|e| remote_io(&format!("cannot read blob {name}"), &e))?;
            blobs.insert(name, content);
        }
        debug!(root = %self.root.display(), blobs = blobs.len(), "Fetched directory remote");
        Ok(RemoteSnapshot::new(blobs))
    }

    fn update(&self, blobs: &BTreeMap<String, String>) -> Result<()> {
        for (key, content) in blobs {
            let path = self.blob_path(key)?;
            if content.is_empty() {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(remote_io(&format!("cannot delete blob {key}"), &e)),
                }
            } else {
                atomic_write(&path, content)
                    .map_err(|e| remote_io(&format!("cannot write blob {key}"), &e))?;
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
