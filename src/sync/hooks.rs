//! Device-specific hook detection for the settings item.
//!
//! A hook entry that mentions a loopback port, an absolute home directory or
//! a home-directory expansion only works on the machine that wrote it. Such
//! entries are stripped before hashing and upload, and the pull side can
//! keep or selectively merge them.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::document::{self, Document};
use super::types::ItemResult;

const HOOKS_KEY: &str = "hooks";

static DEVICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"localhost:\d+",
        r"127\.0\.0\.1:\d+",
        r"0\.0\.0\.0:\d+",
        r"/Users/[^/]+/",
        r"/home/[^/]+/",
        r"C:\\Users\\[^\\]+\\",
        r"\$\{?HOME\}?",
        r"~/",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// How pull treats the `hooks` section of the settings item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HooksStrategy {
    /// Take remote hooks like any other field.
    #[default]
    Overwrite,
    /// Take everything from remote except `hooks`, which stays local.
    Keep,
    /// Take remote hook entries unless they carry device-specific content.
    Merge,
}

/// Device-specific content found in a document's hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HooksAnalysis {
    /// Hook types whose entries matched a device pattern.
    pub hook_types: Vec<String>,
    /// Distinct matched fragments, in discovery order.
    pub matches: Vec<String>,
}

impl HooksAnalysis {
    #[must_use]
    pub fn has_device_content(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Collect all matches of the device patterns in one hook entry.
fn entry_matches(entry: &Value) -> Vec<String> {
    let mut text = Vec::new();
    collect_strings(entry, &mut text);
    let mut found = Vec::new();
    for s in &text {
        for pattern in DEVICE_PATTERNS.iter() {
            for m in pattern.find_iter(s) {
                let m = m.as_str().to_string();
                if !found.contains(&m) {
                    found.push(m);
                }
            }
        }
    }
    found
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => {
            for (k, v) in map {
                out.push(k);
                collect_strings(v, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn is_device_specific(entry: &Value) -> bool {
    !entry_matches(entry).is_empty()
}

/// Analyze a document's hooks for device-specific content.
///
/// Returns an empty analysis for documents without an object-valued
/// `hooks` key.
#[must_use]
pub fn analyze(doc: &Document) -> HooksAnalysis {
    let mut analysis = HooksAnalysis::default();
    let Some(Value::Object(hooks)) = doc.get(HOOKS_KEY) else {
        return analysis;
    };
    for (hook_type, entry) in hooks {
        let found = entry_matches(entry);
        if found.is_empty() {
            continue;
        }
        analysis.hook_types.push(hook_type.clone());
        for m in found {
            if !analysis.matches.contains(&m) {
                analysis.matches.push(m);
            }
        }
    }
    analysis
}

/// Remove every hook-type entry with device-specific content.
///
/// Returns the removed hook types. When no hooks remain the `hooks` key is
/// dropped entirely, so an overlay onto another document leaves its hooks
/// alone.
pub fn strip_device_hooks(doc: &mut Document) -> Vec<String> {
    let Some(Value::Object(hooks)) = doc.get_mut(HOOKS_KEY) else {
        return Vec::new();
    };
    let removed: Vec<String> = hooks
        .iter()
        .filter(|(_, entry)| is_device_specific(entry))
        .map(|(k, _)| k.clone())
        .collect();
    for hook_type in &removed {
        hooks.remove(hook_type);
    }
    if !removed.is_empty() && hooks.is_empty() {
        doc.remove(HOOKS_KEY);
    }
    removed
}

/// Strip device-specific hooks from raw settings text.
///
/// Returns `None` when nothing was removed or the text is not a JSON
/// object, in which case the caller keeps its input unchanged.
#[must_use]
pub fn strip_device_hooks_str(raw: &str) -> Option<String> {
    let mut doc = document::parse_object(raw).ok()?;
    if strip_device_hooks(&mut doc).is_empty() {
        None
    } else {
        Some(document::to_pretty(&doc))
    }
}

/// Overlay `remote` onto `local` but keep the local `hooks` section.
///
/// # Errors
///
/// Returns an error if `remote` is not a JSON object. A malformed local
/// document yields the remote unchanged.
pub fn overlay_keep_local_hooks(local: &str, remote: &str) -> ItemResult<String> {
    let remote_doc = document::parse_object(remote)?;
    let Ok(mut local_doc) = document::parse_object(local) else {
        return Ok(remote.to_string());
    };
    let local_hooks = local_doc.remove(HOOKS_KEY);
    local_doc.extend(remote_doc);
    if let Some(hooks) = local_hooks {
        local_doc.insert(HOOKS_KEY.to_string(), hooks);
    }
    Ok(document::to_pretty(&local_doc))
}

/// Overlay `remote` onto `local`, taking remote hook entries only when they
/// carry no device-specific content.
///
/// Local hook entries the remote does not mention are kept.
///
/// # Errors
///
/// Returns an error if `remote` is not a JSON object.
pub fn overlay_merge_hooks(local: &str, remote: &str) -> ItemResult<String> {
    let mut remote_doc = document::parse_object(remote)?;
    let mut local_doc = document::parse_lenient(local, "local");

    let mut hooks = match local_doc.remove(HOOKS_KEY) {
        Some(Value::Object(map)) => map,
        _ => Document::new(),
    };
    if let Some(Value::Object(remote_hooks)) = remote_doc.remove(HOOKS_KEY) {
        for (hook_type, entry) in remote_hooks {
            if !is_device_specific(&entry) {
                hooks.insert(hook_type, entry);
            }
        }
    }

    local_doc.extend(remote_doc);
    local_doc.insert(HOOKS_KEY.to_string(), Value::Object(hooks));
    Ok(document::to_pretty(&local_doc))
}
