//! confsync CLI entry point.

use clap::Parser;
use confsync::cli::commands;
use confsync::cli::commands::mcp_apply::McpApplyArgs;
use confsync::cli::commands::pull::PullArgs;
use confsync::cli::{Cli, Commands};
use confsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Init {
            remote_id,
            remote_dir,
            force,
        } => commands::init::execute(remote_id.as_deref(), remote_dir.as_deref(), *force, json),
        Commands::Login { token } => commands::login::execute(token.as_deref(), json),
        Commands::Status => commands::status::execute(json),
        Commands::Push { dry_run, force } => commands::push::execute(*dry_run, *force, json),
        Commands::Pull {
            dry_run,
            force,
            yes,
            strategy,
            hooks,
            apply_mcp,
            apply_mcp_overwrite,
        } => commands::pull::execute(
            PullArgs {
                dry_run: *dry_run,
                force: *force,
                yes: *yes,
                strategy: strategy.map(Into::into),
                hooks: hooks.map(Into::into),
                apply_mcp: *apply_mcp,
                apply_mcp_overwrite: *apply_mcp_overwrite,
            },
            json,
        ),
        Commands::McpApply {
            yes,
            overwrite,
            silent,
        } => commands::mcp_apply::execute(
            McpApplyArgs {
                yes: *yes,
                overwrite: *overwrite,
                silent: *silent,
            },
            json,
        ),
        Commands::Config { command } => commands::config::execute(command, json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
