//! Pull command implementation.
//!
//! The configured conflict strategy decides what happens to items whose
//! local copy changed as well:
//!
//! - `remote`: pull with force
//! - `local`: leave them refused
//! - `ask`: report them, then offer to force them through
//!
//! With `--apply-mcp` the global MCP servers are copied into the current
//! project once the pull is done.

use std::io::IsTerminal;

use tracing::info;

use super::Workspace;
use super::mcp_apply::{self, McpApplyArgs};
use crate::cli::prompt::TerminalPrompter;
use crate::cli::render::{check_complete, print_report};
use crate::config::ConflictStrategy;
use crate::error::Result;
use crate::sync::{ConfirmationPolicy, HooksStrategy, MergePolicy, Outcome, PullOptions};

/// Flags given to `confsync pull`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullArgs {
    pub dry_run: bool,
    pub force: bool,
    pub yes: bool,
    pub strategy: Option<MergePolicy>,
    pub hooks: Option<HooksStrategy>,
    pub apply_mcp: bool,
    pub apply_mcp_overwrite: bool,
}

/// Execute the pull command.
///
/// # Errors
///
/// Returns an error if the remote cannot be read, the operator quits, or
/// [`crate::Error::Incomplete`] if any item was refused or failed.
pub fn execute(args: PullArgs, json: bool) -> Result<()> {
    let workspace = Workspace::open()?;
    let mut engine = workspace.engine()?;

    let interactive = !args.yes && std::io::stdin().is_terminal();
    let strategy = workspace.config.conflict_strategy;
    let opts = PullOptions {
        dry_run: args.dry_run,
        force: args.force || strategy == ConflictStrategy::Remote,
        policy: args.strategy.unwrap_or(workspace.config.merge_policy),
        hooks: args.hooks,
        confirmation: if interactive {
            ConfirmationPolicy::interactive()
        } else {
            ConfirmationPolicy::auto()
        },
    };
    info!(
        remote = %workspace.remote.describe(),
        policy = %opts.policy,
        force = opts.force,
        interactive,
        "Pulling"
    );

    let mut prompter = TerminalPrompter::new();
    let mut report = engine.pull(&opts, &mut prompter)?;

    let refused = report.count(Outcome::Refused);
    let offer_force = interactive
        && !opts.force
        && !opts.dry_run
        && strategy == ConflictStrategy::Ask
        && refused > 0;
    let mut shown = false;
    if offer_force {
        if !json {
            print_report("Pull", &report, json)?;
            println!();
            shown = true;
        }
        if prompter.confirm_force(refused) {
            let forced = PullOptions {
                force: true,
                ..opts
            };
            report = engine.pull(&forced, &mut prompter)?;
            shown = false;
        }
    }

    if !shown {
        print_report("Pull", &report, json)?;
    }

    if args.apply_mcp && !args.dry_run {
        let mcp = McpApplyArgs {
            yes: !interactive,
            overwrite: args.apply_mcp_overwrite,
            silent: false,
        };
        mcp_apply::run(&mcp_apply::preferences_path(Some(&workspace.config)), mcp, json)?;
    }
    check_complete(&report)
}
