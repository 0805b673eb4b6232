//! Directory codec: a directory tree as one base64-encoded tar.gz string.
//!
//! Archives are deterministic. Entries are sorted, timestamps and owners are
//! zeroed and modes are normalized, so the same tree always packs to the same
//! string and its fingerprint only moves when content does.
//!
//! Hidden entries (names starting with `.`) are never packed, and unpacking
//! never touches hidden entries already present in the target.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// Errors from packing or unpacking a directory.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid base64 archive: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),

    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, ArchiveError>;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const EXEC_MODE: u32 = 0o755;

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Pack a directory into a base64-encoded tar.gz string.
///
/// A nonexistent directory packs to `""`.
///
/// # Errors
///
/// Returns an error if `dir` exists but is not a directory, or if reading
/// any entry fails.
pub fn pack(dir: &Path) -> Result<String> {
    let meta = match fs::metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e.into()),
    };
    if !meta.is_dir() {
        return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
    }

    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append_tree(&mut builder, dir, Path::new(""))?;
    let gz = builder.into_inner()?;
    let bytes = gz.finish()?;
    Ok(STANDARD.encode(bytes))
}

fn append_tree<W: Write>(builder: &mut Builder<W>, root: &Path, rel: &Path) -> Result<()> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(root.join(rel))?
        .collect::<io::Result<_>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name();
        if is_hidden(&name) {
            continue;
        }
        let rel_path = rel.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let mut header = base_header(EntryType::Directory, DIR_MODE, 0);
            builder.append_data(&mut header, &rel_path, io::empty())?;
            append_tree(builder, root, &rel_path)?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            let mode = file_mode(&entry.metadata()?);
            let mut header = base_header(EntryType::Regular, mode, data.len() as u64);
            builder.append_data(&mut header, &rel_path, data.as_slice())?;
        } else {
            debug!(path = %rel_path.display(), "Skipping non-regular entry");
        }
    }
    Ok(())
}

fn base_header(kind: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 == 0 {
        FILE_MODE
    } else {
        EXEC_MODE
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    FILE_MODE
}

enum Staged {
    Dir(PathBuf),
    File(PathBuf, Vec<u8>, u32),
}

/// Resolve an archive path against the target, refusing anything that
/// could land outside it.
fn safe_relative(raw: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::UnsafePath(raw.display().to_string()));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(ArchiveError::UnsafePath(raw.display().to_string()));
    }
    Ok(out)
}

/// Decode and validate every entry before anything touches the disk.
fn stage(encoded: &str) -> Result<Vec<Staged>> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let mut archive = Archive::new(GzDecoder::new(bytes.as_slice()));
    let mut staged = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.into_owned();
        let rel = safe_relative(&raw)?;
        match entry.header().entry_type() {
            EntryType::Directory => staged.push(Staged::Dir(rel)),
            EntryType::Regular | EntryType::Continuous => {
                let mode = entry.header().mode().unwrap_or(FILE_MODE);
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                staged.push(Staged::File(rel, data, mode));
            }
            other => debug!(path = %rel.display(), kind = ?other, "Skipping archive entry"),
        }
    }
    Ok(staged)
}

/// Unpack an archive into `dir`, replacing its non-hidden contents.
///
/// `""` yields an empty directory. Every entry is validated first: an entry
/// that would resolve outside `dir` fails the whole operation and leaves the
/// target untouched.
///
/// # Errors
///
/// Returns an error on invalid base64 or gzip/tar data, unsafe entry paths,
/// or filesystem failures.
pub fn unpack(encoded: &str, dir: &Path) -> Result<()> {
    let staged = if encoded.trim().is_empty() {
        Vec::new()
    } else {
        stage(encoded)?
    };

    fs::create_dir_all(dir)?;
    clear_visible(dir)?;

    for item in staged {
        match item {
            Staged::Dir(rel) => fs::create_dir_all(dir.join(rel))?,
            Staged::File(rel, data, mode) => {
                let target = dir.join(rel);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, data)?;
                set_mode(&target, mode)?;
            }
        }
    }
    Ok(())
}

/// One line per file in an archive: its relative path, size and a short
/// SHA-256 prefix. Directories are implied by the paths.
///
/// `""` lists as `""`.
///
/// # Errors
///
/// Returns an error on invalid base64 or gzip/tar data, or unsafe entry
/// paths.
pub fn manifest(encoded: &str) -> Result<String> {
    if encoded.trim().is_empty() {
        return Ok(String::new());
    }
    let mut out = String::new();
    for item in stage(encoded)? {
        if let Staged::File(rel, data, _) = item {
            let digest = Sha256::digest(&data);
            let short: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
            out.push_str(&format!("{}  {} bytes  {short}\n", rel.display(), data.len()));
        }
    }
    Ok(out)
}

fn clear_visible(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if mode & 0o111 == 0 { FILE_MODE } else { EXEC_MODE };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
