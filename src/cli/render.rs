//! Human and JSON rendering of run reports.

use colored::{ColoredString, Colorize};

use crate::error::{Error, Result};
use crate::sync::{ItemReport, ItemStatus, Outcome, RunReport};

/// Print a report to stdout.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_report(title: &str, report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("{}{mode}", title.bold());
    println!(
        "Direction: {}  (local v{}, remote v{})",
        report.direction, report.local_version, report.remote_version
    );
    println!();

    let width = report.items.iter().map(|i| i.name.len()).max().unwrap_or(0);
    for item in &report.items {
        println!("{}", item_row(item, width));
    }

    println!();
    println!("{}", summary(report));
    if report.version_after != report.local_version {
        println!("Version: {} -> {}", report.local_version, report.version_after);
    }
    Ok(())
}

fn item_row(item: &ItemReport, width: usize) -> String {
    let mut row = format!(
        "  {:<width$}  {:<12}  {}",
        item.name,
        status_label(item.status),
        outcome_label(item.outcome),
    );
    if let Some(err) = &item.error {
        row.push_str(&format!("  {}", err.to_string().dimmed()));
    }
    row
}

fn status_label(status: ItemStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        ItemStatus::Synced => text.green(),
        ItemStatus::LocalAhead | ItemStatus::New => text.yellow(),
        ItemStatus::RemoteAhead => text.cyan(),
        ItemStatus::Conflict | ItemStatus::Error => text.red().bold(),
    }
}

fn outcome_label(outcome: Outcome) -> ColoredString {
    match outcome {
        Outcome::Unchanged => "-".dimmed(),
        Outcome::Pushed => "pushed".green(),
        Outcome::Pulled => "pulled".green(),
        Outcome::KeptLocal => "kept local".yellow(),
        Outcome::Skipped => "skipped".dimmed(),
        Outcome::Refused => "refused".red(),
        Outcome::Failed => "failed".red().bold(),
        Outcome::Planned => "planned".cyan(),
    }
}

fn summary(report: &RunReport) -> String {
    let parts: Vec<String> = [
        (Outcome::Pushed, "pushed"),
        (Outcome::Pulled, "pulled"),
        (Outcome::KeptLocal, "kept local"),
        (Outcome::Planned, "planned"),
        (Outcome::Skipped, "skipped"),
        (Outcome::Refused, "refused"),
        (Outcome::Failed, "failed"),
    ]
    .into_iter()
    .filter_map(|(outcome, label)| match report.count(outcome) {
        0 => None,
        n => Some(format!("{n} {label}")),
    })
    .collect();

    if parts.is_empty() {
        format!("{} item(s), nothing to transfer", report.items.len())
    } else {
        parts.join(", ")
    }
}

/// Turn refusals and failures into a non-zero exit.
///
/// # Errors
///
/// Returns [`Error::Incomplete`] if any item failed or was refused.
pub fn check_complete(report: &RunReport) -> Result<()> {
    if report.has_problems() {
        return Err(Error::Incomplete {
            failed: report.count(Outcome::Failed),
            refused: report.count(Outcome::Refused),
        });
    }
    Ok(())
}
