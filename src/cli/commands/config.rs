//! Config command implementations.

use colored::Colorize;
use serde_json::json;

use crate::cli::ConfigCommands;
use crate::config::{Config, Paths};
use crate::error::Result;

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or saved, or the item
/// name is unknown.
pub fn execute(command: &ConfigCommands, json: bool) -> Result<()> {
    let paths = Paths::resolve()?;
    match command {
        ConfigCommands::Path => {
            if json {
                println!("{}", json!({ "path": paths.root() }));
            } else {
                println!("{}", paths.root().display());
            }
            Ok(())
        }
        ConfigCommands::Show => show(&Config::load(&paths)?, json),
        ConfigCommands::Enable { name } => set_enabled(&paths, name, true, json),
        ConfigCommands::Disable { name } => set_enabled(&paths, name, false, json),
    }
}

fn show(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(config)?);
        return Ok(());
    }

    match config.remote_target() {
        Ok(target) => println!("Remote:            {target}"),
        Err(_) => println!("Remote:            {}", "(none)".dimmed()),
    }
    println!("Token variable:    ${}", config.token_env);
    println!("Merge policy:      {}", config.merge_policy);
    println!("Conflict strategy: {}", config.conflict_strategy);
    println!();
    println!("Items:");

    let width = config.items.iter().map(|i| i.name.len()).max().unwrap_or(0);
    for item in &config.items {
        let mark = if item.enabled {
            "✓".green()
        } else {
            "·".dimmed()
        };
        println!(
            "  {mark} {:<width$}  {}  ->  {}",
            item.name, item.local_path, item.remote_key
        );
    }
    Ok(())
}

fn set_enabled(paths: &Paths, name: &str, enabled: bool, json: bool) -> Result<()> {
    let mut config = Config::load(paths)?;
    config.set_enabled(name, enabled)?;
    config.save(paths)?;

    if json {
        println!("{}", json!({ "name": name, "enabled": enabled }));
    } else {
        let verb = if enabled { "Enabled" } else { "Disabled" };
        println!("{verb} {name}");
    }
    Ok(())
}
