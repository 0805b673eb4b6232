//! Canonical content: the exact bytes that are hashed and transferred.
//!
//! For file items the pipeline is:
//! 1. whitespace-only content is absent (`""`)
//! 2. preferences: project server registries fold into the global one
//! 3. the field filter, if any, re-serializes the document
//! 4. settings: hook entries with device-specific content are stripped
//!
//! Directory items canonicalize to their packed archive unchanged.
//! Canonicalization is idempotent, so remote content that was produced by a
//! push hashes the same when it is canonicalized again.

use std::fs;
use std::io;

use tracing::debug;

use super::document;
use super::hooks;
use super::merge;
use super::types::{ItemError, ItemResult};
use crate::archive;
use crate::config::{ItemDescriptor, ItemKind, ItemRole};

/// Reduce raw content to canonical content.
///
/// # Errors
///
/// Returns [`ItemError::Parse`] when a step that needs a JSON object gets
/// something else.
pub fn canonicalize(raw: &str, item: &ItemDescriptor) -> ItemResult<String> {
    if item.kind == ItemKind::Directory {
        return Ok(raw.trim().to_string());
    }
    if raw.trim().is_empty() {
        return Ok(String::new());
    }

    let role = item.role();
    let mut content = raw.to_string();

    if role == ItemRole::Preferences {
        let mut doc = document::parse_object(&content)?;
        if merge::fold_project_servers(&mut doc) {
            content = document::to_pretty(&doc);
        }
    }

    if let Some(filter) = &item.filter {
        content = filter.apply_str(&content)?;
    }

    if role == ItemRole::Settings {
        if let Some(stripped) = hooks::strip_device_hooks_str(&content) {
            debug!(item = %item.name, "Stripped device-specific hooks");
            content = stripped;
        }
    }

    if content.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(content)
}

/// Read the raw local content of an item.
///
/// A missing file or directory reads as `""`.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be read or packed.
pub fn read_local(item: &ItemDescriptor) -> ItemResult<String> {
    let path = item.path();
    match item.kind {
        ItemKind::Directory => Ok(archive::pack(&path)?),
        ItemKind::File => match fs::read_to_string(&path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(ItemError::Read { path, source }),
        },
    }
}

/// Read and canonicalize the local side of an item.
///
/// # Errors
///
/// Propagates read and canonicalization failures.
pub fn local_canonical(item: &ItemDescriptor) -> ItemResult<String> {
    canonicalize(&read_local(item)?, item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::FieldFilter;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn settings_item() -> ItemDescriptor {
        ItemDescriptor::file("settings", "/tmp/unused/settings.json", "settings.json")
            .with_filter(FieldFilter::Exclude(vec!["env".into()]))
    }

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_whitespace_is_absent() {
        assert_eq!(canonicalize("  \n\t", &settings_item()).unwrap(), "");
    }

    #[test]
    fn test_plain_item_passes_through() {
        let item = ItemDescriptor::file("plugins-list", "/tmp/x.json", "x.json");
        let raw = "{ \"b\": 1,   \"a\": 2 }\n";
        assert_eq!(canonicalize(raw, &item).unwrap(), raw);
    }

    #[test]
    fn test_settings_filter_and_sanitize() {
        let raw = json!({
            "env": {"API_KEY": "secret"},
            "theme": "dark",
            "hooks": {
                "PreToolUse": [{"command": "/Users/alice/bin/guard.sh"}],
                "Stop": [{"command": "notify done"}]
            }
        })
        .to_string();
        let out = canonicalize(&raw, &settings_item()).unwrap();
        assert_eq!(
            parse(&out),
            json!({"theme": "dark", "hooks": {"Stop": [{"command": "notify done"}]}})
        );
    }

    #[test]
    fn test_preferences_fold_then_include() {
        let item = ItemDescriptor::file("claude-json", "/tmp/.claude.json", "claude.json")
            .with_filter(FieldFilter::Include(vec!["mcpServers".into(), "model".into()]));
        let raw = json!({
            "model": "opus",
            "userID": "abc",
            "mcpServers": {"global": {"command": "g"}},
            "projects": {
                "/work/app": {"mcpServers": {"local": {"command": "l"}, "global": {"command": "other"}}}
            }
        })
        .to_string();
        let out = canonicalize(&raw, &item).unwrap();
        assert_eq!(
            parse(&out),
            json!({
                "model": "opus",
                "mcpServers": {"global": {"command": "g"}, "local": {"command": "l"}}
            })
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let raw = json!({
            "env": {"A": "1"},
            "permissions": {"allow": ["Bash"]},
            "hooks": {"Stop": [{"command": "curl localhost:3000"}]}
        })
        .to_string();
        let item = settings_item();
        let once = canonicalize(&raw, &item).unwrap();
        let twice = canonicalize(&once, &item).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filtered_empty_survivors_are_braces() {
        let item = ItemDescriptor::file("prefs", "/tmp/p.json", "p.json")
            .with_filter(FieldFilter::Include(vec!["model".into()]));
        assert_eq!(canonicalize(r#"{"other":1}"#, &item).unwrap(), "{}");
    }

    #[test]
    fn test_malformed_filtered_item_is_error() {
        assert!(matches!(
            canonicalize("{oops", &settings_item()),
            Err(ItemError::Parse(_))
        ));
    }

    #[test]
    fn test_read_local_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.json");
        let item = ItemDescriptor::file("x", path.to_str().unwrap(), "x.json");
        assert_eq!(read_local(&item).unwrap(), "");

        let dir = temp.path().join("missing-dir");
        let item = ItemDescriptor::directory("d", dir.to_str().unwrap(), "d.tar.gz");
        assert_eq!(local_canonical(&item).unwrap(), "");
    }
}
