//! Bearer token for the gist remote.
//!
//! Resolution order: the configured environment variable, then the
//! `token` file in the config directory.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sync::file::read_optional;

/// Find the bearer token.
///
/// # Errors
///
/// Returns [`Error::MissingCredentials`] if neither source has a token.
pub fn resolve_token(env_var: &str, token_file: &Path) -> Result<String> {
    if let Ok(token) = std::env::var(env_var) {
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    if let Some(raw) = read_optional(token_file)? {
        let token = raw.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    Err(Error::MissingCredentials {
        env_var: env_var.to_string(),
        path: token_file.to_path_buf(),
    })
}

/// Store the token, readable only by the owner.
///
/// # Errors
///
/// Returns an error if the token is blank or the file cannot be written.
pub fn save_token(token_file: &Path, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::InvalidArgument("token must not be empty".into()));
    }
    if let Some(parent) = token_file.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = token_file.with_extension("tmp");
    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(&temp_path)?;
        file.write_all(token.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
    }
    fs::rename(&temp_path, token_file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNSET_VAR: &str = "CONFSYNC_TEST_TOKEN_THAT_IS_NEVER_SET";

    #[test]
    fn test_token_file_fallback() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token");
        save_token(&path, "  ghp_example \n").unwrap();
        assert_eq!(resolve_token(UNSET_VAR, &path).unwrap(), "ghp_example");
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token");
        save_token(&path, "ghp_example").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_credentials() {
        let temp = TempDir::new().unwrap();
        let err = resolve_token(UNSET_VAR, &temp.path().join("token")).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { .. }));
    }

    #[test]
    fn test_blank_token_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(save_token(&temp.path().join("token"), "   ").is_err());
    }
}
