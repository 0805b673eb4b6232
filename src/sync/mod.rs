//! Synchronization engine.
//!
//! Items flow through the same pipeline on every run:
//!
//! - **Canonicalize**: raw content → canonical content (filtering, project
//!   server folding, device-specific hook stripping)
//! - **Detect**: canonical content → fingerprints → change flags against the
//!   last recorded state
//! - **Reconcile**: change flags + version counters → run direction and
//!   per-item status
//! - **Execute**: push, pull (with structural merges) or report
//!
//! # Example
//!
//! ```ignore
//! use confsync::sync::{Engine, PushOptions};
//!
//! let mut engine = Engine::new(&items, remote.as_ref(), paths.state_file())?;
//! let report = engine.push(PushOptions::default())?;
//! ```

mod canonical;
mod confirm;
mod detect;
mod document;
mod engine;
pub mod file;
mod filter;
mod hash;
mod hooks;
mod merge;
mod meta;
mod reconcile;
mod types;

pub use canonical::{canonicalize, local_canonical};
pub use confirm::{ConfirmChoice, ConfirmationPolicy, KeyChoice, NoPrompt, Prompter, Side};
pub use detect::{ItemSnapshot, Observation, detect};
pub use document::{Document, to_pretty};
pub use engine::{Engine, PullOptions, PushOptions};
pub use filter::FieldFilter;
pub use hash::{fingerprint, has_changed};
pub use hooks::{HooksAnalysis, HooksStrategy};
pub use merge::{
    MergePolicy, MergeSchema, MergeStats, Merged, ProjectServers, apply_global_servers,
    merge_documents, merge_str,
};
pub use meta::{META_KEY, RemoteMeta};
pub use reconcile::{ChangeFlags, Reconciliation, VersionVerdict, reconcile, reconcile_versions};
pub use types::{Direction, ItemError, ItemReport, ItemResult, ItemStatus, Outcome, RunReport};
