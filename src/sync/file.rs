//! Atomic file writes.
//!
//! Pulled items, the sync state and the config are all written through
//! [`atomic_write`]: content goes to a sibling temp file, is synced to disk,
//! then renamed over the target. A crash leaves either the old or the new
//! file, never a torn one.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.confsync.tmp"))
}

/// Write content to a file atomically, creating parent directories.
///
/// # Errors
///
/// Returns an error if any file operation fails. The original file, if
/// any, is left untouched in that case.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    {
        let file = File::create(&temp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}

/// Read a file, mapping "not found" to `None`.
///
/// # Errors
///
/// Returns any error other than `NotFound`.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
