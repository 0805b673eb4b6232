//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sync::{HooksStrategy, MergePolicy};

pub mod commands;
pub mod prompt;
pub mod render;

/// confsync - keep agent configuration consistent between machines
#[derive(Parser, Debug)]
#[command(name = "confsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON (default when stdout is not a terminal)
    #[arg(long, alias = "robot", global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config and connect a remote
    Init {
        /// Use an existing gist as the remote
        #[arg(long, conflicts_with = "remote_dir")]
        remote_id: Option<String>,

        /// Use a local directory as the remote
        #[arg(long)]
        remote_dir: Option<PathBuf>,

        /// Overwrite an existing config and reset sync state
        #[arg(long)]
        force: bool,
    },

    /// Store the bearer token for the gist remote
    Login {
        /// Token to store (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Show per-item sync status
    Status,

    /// Upload local changes
    Push {
        /// Show what would be uploaded without writing
        #[arg(long)]
        dry_run: bool,

        /// Upload conflicting items anyway
        #[arg(short, long)]
        force: bool,
    },

    /// Apply remote changes locally
    Pull {
        /// Show what would be applied without writing
        #[arg(long)]
        dry_run: bool,

        /// Overwrite conflicting items anyway
        #[arg(short, long)]
        force: bool,

        /// Apply without asking
        #[arg(short, long)]
        yes: bool,

        /// Merge strategy for structured items (default: from config)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// How to treat incoming hooks in settings
        #[arg(long, value_enum)]
        hooks: Option<HooksArg>,

        /// Apply the global MCP servers to the current project afterwards
        #[arg(long)]
        apply_mcp: bool,

        /// With --apply-mcp, replace the project's servers instead of adding missing ones
        #[arg(long, requires = "apply_mcp")]
        apply_mcp_overwrite: bool,
    },

    /// Copy the global MCP servers into the current project
    McpApply {
        /// Apply without asking
        #[arg(short, long)]
        yes: bool,

        /// Replace the project's servers instead of adding missing ones
        #[arg(long)]
        overwrite: bool,

        /// Print nothing when already up to date (implies --yes)
        #[arg(long)]
        silent: bool,
    },

    /// Inspect or change the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the configuration
    Show,
    /// Print the config directory
    Path,
    /// Start syncing an item
    Enable {
        /// Item name
        name: String,
    },
    /// Stop syncing an item
    Disable {
        /// Item name
        name: String,
    },
}

/// Merge strategy accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    /// Negotiate server registries key by key
    #[value(alias = "merge")]
    Smart,
    /// Remote values win
    Remote,
    /// Local values are never overwritten
    Local,
}

impl From<StrategyArg> for MergePolicy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Smart => Self::Smart,
            StrategyArg::Remote => Self::PreferRemote,
            StrategyArg::Local => Self::PreferLocal,
        }
    }
}

/// Hooks handling accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HooksArg {
    /// Take remote hooks as-is
    Overwrite,
    /// Keep local hooks
    Keep,
    /// Take remote hooks that carry no device-specific paths
    Merge,
}

impl From<HooksArg> for HooksStrategy {
    fn from(arg: HooksArg) -> Self {
        match arg {
            HooksArg::Overwrite => Self::Overwrite,
            HooksArg::Keep => Self::Keep,
            HooksArg::Merge => Self::Merge,
        }
    }
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
