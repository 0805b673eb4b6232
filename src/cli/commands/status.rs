//! Status command implementation.

use super::Workspace;
use crate::cli::render::print_report;
use crate::error::Result;

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the remote cannot be
/// read.
pub fn execute(json: bool) -> Result<()> {
    let workspace = Workspace::open()?;
    let engine = workspace.engine()?;
    let report = engine.status()?;

    let title = format!("Status ({})", workspace.remote.describe());
    print_report(&title, &report, json)
}
