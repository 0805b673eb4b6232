//! Version command implementation.

use serde::Serialize;

use crate::config::Paths;
use crate::error::Result;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    build: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_dir: Option<String>,
}

impl VersionOutput {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build: if cfg!(debug_assertions) { "dev" } else { "release" },
            config_dir: Paths::resolve()
                .ok()
                .map(|p| p.root().display().to_string()),
        }
    }
}

/// Print the version and the config directory in use.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput::current();

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} version {} ({})", output.name, output.version, output.build);
    if let Some(dir) = &output.config_dir {
        println!("config: {dir}");
    }
    Ok(())
}
