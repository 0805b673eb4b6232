//! confsync - keep agent configuration consistent between machines
//!
//! This crate provides the sync engine behind the `confsync` CLI: named
//! configuration items (files and directories) are mirrored between this
//! machine and one remote blob store, with change detection by content
//! fingerprint and a global version counter to break ties.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Config directory, item descriptors, credentials, sync state
//! - [`sync`] - Canonicalization, detection, reconciliation, merging, transfer
//! - [`remote`] - Remote blob stores (GitHub gist, plain directory)
//! - [`archive`] - Directory codec (base64 of tar.gz)
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod sync;

pub use error::{Error, Result};
