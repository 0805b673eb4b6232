//! Terminal prompts for interactive pulls.
//!
//! Uses dialoguer for selection and similar for the line diff shown before
//! each overwrite. Everything is written to stderr so `--json` output on
//! stdout stays parseable.

use colored::Colorize;
use dialoguer::{Confirm, Password, Select};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use tracing::warn;

use crate::error::{Error, Result};
use crate::sync::{ConfirmChoice, HooksAnalysis, HooksStrategy, KeyChoice, Prompter};

const CONTEXT_LINES: usize = 3;

/// [`Prompter`] backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Ask whether refused conflicts should be forced through.
    pub fn confirm_force(&mut self, conflicts: usize) -> bool {
        Confirm::new()
            .with_prompt(format!(
                "{conflicts} item(s) have local changes. Overwrite local changes?"
            ))
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Prompt failed, keeping local changes");
                false
            })
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, item: &str, current: &str, incoming: &str) -> ConfirmChoice {
        eprintln!();
        eprintln!("{} {}", "Incoming changes for".bold(), item.cyan().bold());
        eprint!("{}", render_diff(current, incoming));

        const CHOICES: [(&str, ConfirmChoice); 5] = [
            ("Apply", ConfirmChoice::Yes),
            ("Skip", ConfirmChoice::No),
            ("Apply this and all remaining", ConfirmChoice::YesToAll),
            ("Show full incoming content", ConfirmChoice::Preview),
            ("Quit", ConfirmChoice::Quit),
        ];
        let labels: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();

        match Select::new()
            .with_prompt(format!("Apply changes to {item}?"))
            .items(&labels)
            .default(0)
            .interact_opt()
        {
            Ok(Some(idx)) => CHOICES[idx].1,
            Ok(None) => ConfirmChoice::Quit,
            Err(e) => {
                warn!(error = %e, "Prompt failed, quitting");
                ConfirmChoice::Quit
            }
        }
    }

    fn preview(&mut self, item: &str, incoming: &str) {
        eprintln!();
        eprintln!("{}", format!("── {item} (incoming) ──").dimmed());
        eprintln!("{incoming}");
        eprintln!("{}", "──".dimmed());
    }

    fn resolve_key(
        &mut self,
        context: &str,
        key: &str,
        local: &Value,
        remote: &Value,
    ) -> KeyChoice {
        eprintln!();
        eprintln!("{} {} in {}", "Conflicting entry".bold(), key.cyan().bold(), context);
        eprintln!("{}", "local:".yellow());
        eprintln!("{}", pretty(local));
        eprintln!("{}", "remote:".green());
        eprintln!("{}", pretty(remote));

        const CHOICES: [(&str, KeyChoice); 4] = [
            ("Take remote", KeyChoice::TakeRemote),
            ("Keep local", KeyChoice::TakeLocal),
            ("Take remote for all remaining", KeyChoice::TakeRemoteForAll),
            ("Keep local for all remaining", KeyChoice::TakeLocalForAll),
        ];
        let labels: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();

        match Select::new()
            .with_prompt(format!("Which {key} wins?"))
            .items(&labels)
            .default(1)
            .interact()
        {
            Ok(idx) => CHOICES[idx].1,
            Err(e) => {
                warn!(error = %e, "Prompt failed, keeping local entry");
                KeyChoice::TakeLocal
            }
        }
    }

    fn choose_hooks(&mut self, item: &str, analysis: &HooksAnalysis) -> Option<HooksStrategy> {
        eprintln!();
        eprintln!(
            "{} {} hooks reference machine-specific paths:",
            "Note:".yellow().bold(),
            item
        );
        for fragment in &analysis.matches {
            eprintln!("  {}", fragment.dimmed());
        }

        const CHOICES: [(&str, Option<HooksStrategy>); 4] = [
            ("Keep local hooks", Some(HooksStrategy::Keep)),
            ("Merge (skip machine-specific entries)", Some(HooksStrategy::Merge)),
            ("Overwrite with remote hooks", Some(HooksStrategy::Overwrite)),
            ("Cancel pull", None),
        ];
        let labels: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();

        match Select::new()
            .with_prompt("How should hooks be handled?")
            .items(&labels)
            .default(0)
            .interact_opt()
        {
            Ok(Some(idx)) => CHOICES[idx].1,
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Prompt failed, keeping local hooks");
                Some(HooksStrategy::Keep)
            }
        }
    }
}

/// Read a token without echoing it.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn read_token() -> Result<String> {
    Password::new()
        .with_prompt("GitHub token (gist scope)")
        .interact()
        .map_err(|e| Error::Other(format!("Failed to read token: {e}")))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Unified line diff from `current` to `incoming`, colored.
#[must_use]
pub fn render_diff(current: &str, incoming: &str) -> String {
    let diff = TextDiff::from_lines(current, incoming);
    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_LINES);

    let mut out = String::new();
    for hunk in unified.iter_hunks() {
        out.push_str(&format!("{}\n", hunk.header().to_string().cyan()));
        for change in hunk.iter_changes() {
            let text = change.value().trim_end_matches('\n');
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{text}").red().to_string(),
                ChangeTag::Insert => format!("+{text}").green().to_string(),
                ChangeTag::Equal => format!(" {text}").dimmed().to_string(),
            };
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}
