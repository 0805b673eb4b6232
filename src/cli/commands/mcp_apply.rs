//! Apply the global MCP servers to the current project.
//!
//! The preferences file keeps one global `mcpServers` registry and one per
//! project under `projects.<path>.mcpServers`. Only the global registry
//! travels between machines, so this command copies it into the entry for
//! the working directory after showing the change.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::cli::prompt::TerminalPrompter;
use crate::config::{Config, ItemKind, ItemRole, Paths, expand_path};
use crate::error::{Error, Result};
use crate::sync::file::{atomic_write, read_optional};
use crate::sync::{ConfirmChoice, Document, Prompter, apply_global_servers, to_pretty};

const DEFAULT_PREFERENCES: &str = "~/.claude.json";

/// Flags given to `confsync mcp-apply`.
#[derive(Debug, Clone, Copy, Default)]
pub struct McpApplyArgs {
    /// Apply without asking.
    pub yes: bool,
    /// Replace the project registry instead of adding missing servers.
    pub overwrite: bool,
    /// Print nothing unless something changed. Implies `yes`.
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum McpResult {
    Applied,
    UpToDate,
    Skipped,
    NoGlobalServers,
}

#[derive(Serialize)]
struct McpApplyOutput {
    path: PathBuf,
    project: String,
    result: McpResult,
    mode: &'static str,
    servers: usize,
}

/// Execute the mcp-apply command.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if the operator quits, or an error if the
/// preferences file cannot be read, parsed or written.
pub fn execute(args: McpApplyArgs, json: bool) -> Result<()> {
    let config = match Paths::resolve().and_then(|paths| Config::load(&paths)) {
        Ok(config) => Some(config),
        Err(Error::NotInitialized) => None,
        Err(e) => return Err(e),
    };
    run(&preferences_path(config.as_ref()), args, json)
}

/// Preferences file of the configured item list, or the default location.
pub(crate) fn preferences_path(config: Option<&Config>) -> PathBuf {
    config
        .and_then(|c| {
            c.items
                .iter()
                .find(|i| i.kind == ItemKind::File && i.role() == ItemRole::Preferences)
        })
        .map_or_else(|| expand_path(DEFAULT_PREFERENCES), |item| item.path())
}

/// Apply the global servers in `path` to the working directory's project.
pub(crate) fn run(path: &Path, args: McpApplyArgs, json: bool) -> Result<()> {
    let project = std::env::current_dir()?.to_string_lossy().into_owned();
    let mode = if args.overwrite { "overwrite" } else { "merge" };
    let mut output = McpApplyOutput {
        path: path.to_path_buf(),
        project,
        result: McpResult::NoGlobalServers,
        mode,
        servers: 0,
    };

    let raw = read_optional(path)?.unwrap_or_default();
    let mut doc: Document = if raw.trim().is_empty() {
        Document::new()
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidArgument(format!("{}: {e}", path.display())))?
    };

    let Some(applied) = apply_global_servers(&mut doc, &output.project, args.overwrite) else {
        debug!(path = %path.display(), "No global MCP servers");
        return print(&output, args, json);
    };
    output.servers = applied.servers;
    if !applied.changed() {
        output.result = McpResult::UpToDate;
        return print(&output, args, json);
    }

    let interactive = !args.yes && !args.silent && std::io::stdin().is_terminal();
    if interactive {
        let label = format!("projects[{}].mcpServers", output.project);
        let mut prompter = TerminalPrompter::new();
        loop {
            match prompter.confirm(&label, &applied.before, &applied.after) {
                ConfirmChoice::Yes | ConfirmChoice::YesToAll => break,
                ConfirmChoice::No => {
                    output.result = McpResult::Skipped;
                    return print(&output, args, json);
                }
                ConfirmChoice::Quit => return Err(Error::Cancelled),
                ConfirmChoice::Preview => prompter.preview(&label, &applied.after),
            }
        }
    }

    atomic_write(path, &to_pretty(&doc))?;
    info!(path = %path.display(), project = %output.project, mode, "Applied MCP servers");
    output.result = McpResult::Applied;
    print(&output, args, json)
}

fn print(output: &McpApplyOutput, args: McpApplyArgs, json: bool) -> Result<()> {
    if args.silent && output.result != McpResult::Applied {
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string(output)?);
        return Ok(());
    }
    match output.result {
        McpResult::Applied => println!(
            "Applied MCP servers to {} ({} server(s), {})",
            output.project, output.servers, output.mode
        ),
        McpResult::UpToDate => println!("MCP servers for {} are already up to date", output.project),
        McpResult::Skipped => println!("Skipped applying MCP servers"),
        McpResult::NoGlobalServers => {
            println!("No global MCP servers in {}", output.path.display());
        }
    }
    Ok(())
}
