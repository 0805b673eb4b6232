//! Push command implementation.

use tracing::info;

use super::Workspace;
use crate::cli::render::{check_complete, print_report};
use crate::error::Result;
use crate::sync::PushOptions;

/// Execute the push command.
///
/// # Errors
///
/// Returns an error if the remote cannot be read or written, or
/// [`crate::Error::Incomplete`] if any item was refused or failed.
pub fn execute(dry_run: bool, force: bool, json: bool) -> Result<()> {
    let workspace = Workspace::open()?;
    let mut engine = workspace.engine()?;
    info!(remote = %workspace.remote.describe(), dry_run, force, "Pushing");

    let report = engine.push(PushOptions { dry_run, force })?;
    print_report("Push", &report, json)?;
    check_complete(&report)
}
