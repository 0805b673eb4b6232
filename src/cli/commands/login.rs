//! Login command implementation.

use serde::Serialize;
use std::path::PathBuf;

use crate::cli::prompt::read_token;
use crate::config::{Paths, save_token};
use crate::error::Result;

#[derive(Serialize)]
struct LoginOutput {
    path: PathBuf,
}

/// Store the gist token in the config directory.
///
/// # Errors
///
/// Returns an error if the token is blank or cannot be written.
pub fn execute(token: Option<&str>, json: bool) -> Result<()> {
    let paths = Paths::resolve()?;
    let token = match token {
        Some(t) => t.to_string(),
        None => read_token()?,
    };

    let path = paths.token_file();
    save_token(&path, &token)?;

    if json {
        println!("{}", serde_json::to_string(&LoginOutput { path })?);
    } else {
        println!("Token saved to {}", path.display());
    }
    Ok(())
}
