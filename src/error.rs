//! Error types for confsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=setup, 3=remote, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Problems scoped to a single item never surface here; they are carried as
//! [`crate::sync::ItemError`] values inside the run report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for confsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Setup (exit 2)
    NotInitialized,
    AlreadyInitialized,
    MissingCredentials,

    // Remote (exit 3)
    RemoteError,
    ForeignRemote,

    // Validation (exit 4)
    InvalidArgument,
    UnknownItem,

    // Incomplete run (exit 5)
    SyncIncomplete,

    // Sync (exit 6)
    Cancelled,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ForeignRemote => "FOREIGN_REMOTE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnknownItem => "UNKNOWN_ITEM",
            Self::SyncIncomplete => "SYNC_INCOMPLETE",
            Self::Cancelled => "CANCELLED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::MissingCredentials => 2,
            Self::RemoteError | Self::ForeignRemote => 3,
            Self::InvalidArgument | Self::UnknownItem => 4,
            Self::SyncIncomplete => 5,
            Self::Cancelled => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same command may succeed.
    ///
    /// True for transport failures and corrected input. False for
    /// identity mismatches and local filesystem errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteError
                | Self::InvalidArgument
                | Self::UnknownItem
                | Self::SyncIncomplete
                | Self::Cancelled
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that abort a confsync command.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `confsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("No credentials found (checked ${env_var} and {path})")]
    MissingCredentials { env_var: String, path: PathBuf },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Remote identity mismatch: state was recorded against {recorded}, remote reports {found}")]
    ForeignRemote { recorded: String, found: String },

    #[error("Unknown item: {name}")]
    UnknownItem { name: String, available: Vec<String> },

    #[error("{failed} item(s) failed, {refused} item(s) refused")]
    Incomplete { failed: usize, refused: usize },

    #[error("Cancelled by user")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::MissingCredentials { .. } => ErrorCode::MissingCredentials,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::ForeignRemote { .. } => ErrorCode::ForeignRemote,
            Self::UnknownItem { .. } => ErrorCode::UnknownItem,
            Self::Incomplete { .. } => ErrorCode::SyncIncomplete,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `confsync init` to create the config and remote".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Config already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::MissingCredentials { env_var, .. } => Some(format!(
                "Export ${env_var} or run `confsync login --token <TOKEN>`"
            )),

            Self::Remote(_) => {
                Some("Check network access and that the remote still exists".to_string())
            }

            Self::ForeignRemote { .. } => Some(
                "The configured remote is not the one this machine last synced with.\n  \
                 Re-point the config, or run `confsync init --force` to start over"
                    .to_string(),
            ),

            Self::UnknownItem { available, .. } => {
                Some(format!("Configured items: {}", available.join(", ")))
            }

            Self::Incomplete { refused, .. } if *refused > 0 => Some(
                "Run `confsync status` to inspect; `--force` overrides conflicts".to_string(),
            ),
            Self::Incomplete { .. } => {
                Some("Run with -v for details on the failing items".to_string())
            }

            Self::Cancelled => Some(
                "Items applied before quitting were recorded; run the command again to continue"
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("strategy") {
                    Some("Valid strategies: smart, remote, local".to_string())
                } else if msg.contains("hooks") {
                    Some("Valid hooks strategies: overwrite, keep, merge".to_string())
                } else {
                    None
                }
            }

            Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Other(_) => {
                None
            }
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(Error::Remote("timeout".into()).exit_code(), 3);
        assert_eq!(Error::Incomplete { failed: 1, refused: 0 }.exit_code(), 5);
        assert_eq!(Error::Cancelled.exit_code(), 6);
        assert_eq!(Error::Config("bad".into()).exit_code(), 7);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::UnknownItem {
            name: "nope".into(),
            available: vec!["settings".into(), "skills".into()],
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "UNKNOWN_ITEM");
        assert_eq!(json["error"]["exit_code"], 4);
        assert!(json["error"]["hint"].as_str().unwrap().contains("settings, skills"));
    }

    #[test]
    fn test_foreign_remote_not_retryable() {
        let err = Error::ForeignRemote {
            recorded: "a".into(),
            found: "b".into(),
        };
        assert!(!err.error_code().is_retryable());
        assert!(err.hint().is_some());
    }
}
