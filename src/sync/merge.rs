//! Structural merge of JSON documents.
//!
//! A [`MergeSchema`] names which sub-maps are keyed registries (merged entry
//! by entry, for example `mcpServers`) and which are containers that hold
//! registries further down (`projects`, `projects.<path>`). Everything else
//! is an opaque value that is replaced or kept as a whole.
//!
//! All policies share one guarantee: a key present on only one side is
//! never deleted. Policies only differ in who wins when both sides hold a
//! key with different values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::confirm::{ConfirmationPolicy, KeyChoice, NoPrompt, Prompter, Side};
use super::document::{self, Document};
use crate::config::ItemRole;

const GLOBAL_SERVERS: &str = "mcpServers";
const PROJECTS: &str = "projects";

/// Who wins when both sides hold a key with different values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Remote values win everywhere; local-only keys survive.
    #[serde(rename = "remote")]
    PreferRemote,
    /// Local values are never overwritten; only missing keys are added.
    #[serde(rename = "local")]
    PreferLocal,
    /// Registry conflicts are negotiated per key; other top-level fields
    /// follow the remote.
    #[default]
    #[serde(alias = "merge")]
    Smart,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreferRemote => write!(f, "remote"),
            Self::PreferLocal => write!(f, "local"),
            Self::Smart => write!(f, "smart"),
        }
    }
}

/// Which paths of a document are structurally mergeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSchema {
    /// Registry paths; `*` matches any single key.
    registries: &'static [&'static [&'static str]],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Registry,
    Container,
    Opaque,
}

impl MergeSchema {
    /// No registries: every top-level key is opaque.
    pub const FLAT: Self = Self { registries: &[] };

    /// Application preferences with global and per-project server
    /// registries.
    pub const PREFERENCES: Self = Self {
        registries: &[&[GLOBAL_SERVERS], &["mcp"], &[PROJECTS, "*", GLOBAL_SERVERS]],
    };

    #[must_use]
    pub const fn for_role(role: ItemRole) -> Self {
        match role {
            ItemRole::Preferences => Self::PREFERENCES,
            ItemRole::Plain | ItemRole::Settings => Self::FLAT,
        }
    }

    fn classify(&self, path: &[String]) -> Node {
        let mut node = Node::Opaque;
        for pattern in self.registries {
            if pattern.len() < path.len() {
                continue;
            }
            let matches = pattern
                .iter()
                .zip(path)
                .all(|(p, seg)| *p == "*" || *p == seg);
            if !matches {
                continue;
            }
            if pattern.len() == path.len() {
                return Node::Registry;
            }
            node = Node::Container;
        }
        node
    }
}

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Keys taken from remote that were missing locally.
    pub added: usize,
    /// Local values replaced by remote values.
    pub replaced: usize,
    /// Differing keys where the local value was kept.
    pub kept_local: usize,
    /// Registry conflicts the prompter was asked about.
    pub prompts: usize,
}

/// Result of a structural merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub document: Document,
    /// Confirmation policy to use for the rest of the run.
    pub confirmation: ConfirmationPolicy,
    pub stats: MergeStats,
}

struct Merger<'a> {
    policy: MergePolicy,
    schema: MergeSchema,
    prompter: &'a mut dyn Prompter,
    confirmation: ConfirmationPolicy,
    stats: MergeStats,
}

impl Merger<'_> {
    fn merge_map(&mut self, local: &mut Document, remote: Document, path: &mut Vec<String>) {
        for (key, remote_value) in remote {
            path.push(key.clone());
            if let Some(local_value) = local.get_mut(&key) {
                if *local_value != remote_value {
                    self.merge_value(local_value, remote_value, path);
                }
            } else {
                local.insert(key, remote_value);
                self.stats.added += 1;
            }
            path.pop();
        }
    }

    fn merge_value(&mut self, local: &mut Value, remote: Value, path: &mut Vec<String>) {
        let node = self.schema.classify(path);
        match (node, local, remote) {
            (Node::Container, Value::Object(l), Value::Object(r)) => self.merge_map(l, r, path),
            (Node::Registry, Value::Object(l), Value::Object(r)) => self.merge_registry(l, r, path),
            (_, local, remote) => self.resolve_opaque(local, remote, path.len() == 1),
        }
    }

    fn merge_registry(&mut self, local: &mut Document, remote: Document, path: &[String]) {
        for (entry, remote_value) in remote {
            let Some(local_value) = local.get_mut(&entry) else {
                local.insert(entry, remote_value);
                self.stats.added += 1;
                continue;
            };
            if *local_value == remote_value {
                continue;
            }
            let side = match self.policy {
                MergePolicy::PreferRemote => Side::Remote,
                MergePolicy::PreferLocal => Side::Local,
                MergePolicy::Smart => self.negotiate(path, &entry, local_value, &remote_value),
            };
            self.take(local_value, remote_value, side);
        }
    }

    fn resolve_opaque(&mut self, local: &mut Value, remote: Value, top_level: bool) {
        let side = match self.policy {
            MergePolicy::PreferRemote => Side::Remote,
            MergePolicy::PreferLocal => Side::Local,
            MergePolicy::Smart if top_level => Side::Remote,
            MergePolicy::Smart => Side::Local,
        };
        self.take(local, remote, side);
    }

    fn take(&mut self, local: &mut Value, remote: Value, side: Side) {
        match side {
            Side::Remote => {
                *local = remote;
                self.stats.replaced += 1;
            }
            Side::Local => self.stats.kept_local += 1,
        }
    }

    fn negotiate(&mut self, path: &[String], key: &str, local: &Value, remote: &Value) -> Side {
        if let Some(side) = self.confirmation.bulk_side() {
            return side;
        }
        if self.confirmation.is_auto() {
            return Side::Local;
        }
        self.stats.prompts += 1;
        match self.prompter.resolve_key(&path.join("."), key, local, remote) {
            KeyChoice::TakeRemote => Side::Remote,
            KeyChoice::TakeLocal => Side::Local,
            KeyChoice::TakeRemoteForAll => {
                self.confirmation = self.confirmation.with_bulk_side(Side::Remote);
                Side::Remote
            }
            KeyChoice::TakeLocalForAll => {
                self.confirmation = self.confirmation.with_bulk_side(Side::Local);
                Side::Local
            }
        }
    }
}

/// Merge `remote` into `local` under a policy.
///
/// Registry conflicts under [`MergePolicy::Smart`] are settled by a bulk
/// choice already in `confirmation`, by keeping local when auto-confirm is
/// on, or by asking `prompter`. The returned policy carries any new bulk
/// choice forward.
pub fn merge_documents(
    local: Document,
    remote: Document,
    policy: MergePolicy,
    schema: MergeSchema,
    prompter: &mut dyn Prompter,
    confirmation: ConfirmationPolicy,
) -> Merged {
    let mut merger = Merger {
        policy,
        schema,
        prompter,
        confirmation,
        stats: MergeStats::default(),
    };
    let mut document = local;
    merger.merge_map(&mut document, remote, &mut Vec::new());
    Merged {
        document,
        confirmation: merger.confirmation,
        stats: merger.stats,
    }
}

/// Merge raw JSON texts. A malformed side is treated as empty.
pub fn merge_str(
    local: &str,
    remote: &str,
    policy: MergePolicy,
    schema: MergeSchema,
    prompter: &mut dyn Prompter,
    confirmation: ConfirmationPolicy,
) -> Merged {
    merge_documents(
        document::parse_lenient(local, "local"),
        document::parse_lenient(remote, "remote"),
        policy,
        schema,
        prompter,
        confirmation,
    )
}

/// Fold per-project server registries into the global one.
///
/// Only servers missing from the global registry are added; the first
/// project (in key order) wins for duplicate names. Returns whether the
/// document changed.
pub fn fold_project_servers(doc: &mut Document) -> bool {
    let Some(Value::Object(projects)) = doc.get(PROJECTS) else {
        return false;
    };

    let mut global = match doc.get(GLOBAL_SERVERS) {
        Some(Value::Object(map)) => map.clone(),
        _ => Document::new(),
    };
    let mut changed = false;
    for project in projects.values() {
        let Some(Value::Object(servers)) = project.get(GLOBAL_SERVERS) else {
            continue;
        };
        for (name, server) in servers {
            if !global.contains_key(name) {
                global.insert(name.clone(), server.clone());
                changed = true;
            }
        }
    }

    if changed {
        doc.insert(GLOBAL_SERVERS.to_string(), Value::Object(global));
    }
    changed
}

/// What copying the global server registry into one project did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectServers {
    /// Project registry before the copy, pretty printed.
    pub before: String,
    /// Project registry after the copy.
    pub after: String,
    /// Servers in the project registry afterwards.
    pub servers: usize,
}

impl ProjectServers {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Copy the global server registry into `projects.<project>.mcpServers`.
///
/// By default servers already configured for the project are kept and only
/// missing global servers are added. `overwrite` replaces the project
/// registry with the global one. The document is only modified when the
/// project registry changes.
///
/// Returns `None` when there is no non-empty global registry, or when
/// `projects` or the project entry is not an object.
pub fn apply_global_servers(
    doc: &mut Document,
    project: &str,
    overwrite: bool,
) -> Option<ProjectServers> {
    let global = match doc.get(GLOBAL_SERVERS) {
        Some(Value::Object(map)) if !map.is_empty() => map.clone(),
        _ => return None,
    };
    let current = match doc
        .get(PROJECTS)
        .and_then(|p| p.get(project))
        .and_then(|p| p.get(GLOBAL_SERVERS))
    {
        Some(Value::Object(map)) => map.clone(),
        _ => Document::new(),
    };

    let next = if overwrite {
        global
    } else {
        merge_documents(
            current.clone(),
            global,
            MergePolicy::PreferLocal,
            MergeSchema::FLAT,
            &mut NoPrompt,
            ConfirmationPolicy::auto(),
        )
        .document
    };
    let result = ProjectServers {
        before: document::to_pretty(&current),
        after: document::to_pretty(&next),
        servers: next.len(),
    };
    if !result.changed() {
        return Some(result);
    }

    let projects = doc
        .entry(PROJECTS)
        .or_insert_with(|| Value::Object(Document::new()))
        .as_object_mut()?;
    let entry = projects
        .entry(project)
        .or_insert_with(|| Value::Object(Document::new()))
        .as_object_mut()?;
    entry.insert(GLOBAL_SERVERS.to_string(), Value::Object(next));
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::confirm::NoPrompt;
    use crate::sync::confirm::testing::ScriptedPrompter;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn merge(local: Value, remote: Value, policy: MergePolicy) -> Value {
        let merged = merge_documents(
            doc(local),
            doc(remote),
            policy,
            MergeSchema::PREFERENCES,
            &mut NoPrompt,
            ConfirmationPolicy::interactive(),
        );
        Value::Object(merged.document)
    }

    #[test]
    fn test_prefer_local_keeps_local_value() {
        let out = merge(
            json!({"mcpServers": {"k": 1}}),
            json!({"mcpServers": {"k": 2}}),
            MergePolicy::PreferLocal,
        );
        assert_eq!(out, json!({"mcpServers": {"k": 1}}));
    }

    #[test]
    fn test_prefer_remote_takes_remote_value() {
        let out = merge(
            json!({"mcpServers": {"k": 1}}),
            json!({"mcpServers": {"k": 2}}),
            MergePolicy::PreferRemote,
        );
        assert_eq!(out, json!({"mcpServers": {"k": 2}}));
    }

    #[test]
    fn test_one_sided_keys_survive_every_policy() {
        for policy in [MergePolicy::PreferRemote, MergePolicy::PreferLocal, MergePolicy::Smart] {
            let out = merge(
                json!({"mcpServers": {"mine": 1}, "localOnly": true}),
                json!({"mcpServers": {"theirs": 2}, "remoteOnly": true}),
                policy,
            );
            assert_eq!(
                out,
                json!({
                    "mcpServers": {"mine": 1, "theirs": 2},
                    "localOnly": true,
                    "remoteOnly": true
                }),
                "{policy}"
            );
        }
    }

    #[test]
    fn test_smart_into_empty_local_asks_nothing() {
        let mut prompter = ScriptedPrompter::default();
        let merged = merge_documents(
            Document::new(),
            doc(json!({"mcpServers": {"a": 1}})),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut prompter,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(Value::Object(merged.document), json!({"mcpServers": {"a": 1}}));
        assert!(prompter.asked_keys.is_empty());
    }

    #[test]
    fn test_smart_overlays_top_level_opaque_fields() {
        let out = merge(
            json!({"model": "sonnet", "autoUpdates": true}),
            json!({"model": "opus"}),
            MergePolicy::Smart,
        );
        assert_eq!(out, json!({"model": "opus", "autoUpdates": true}));
    }

    #[test]
    fn test_prefer_local_never_overwrites_opaque() {
        let out = merge(
            json!({"model": "sonnet"}),
            json!({"model": "opus", "theme": "dark"}),
            MergePolicy::PreferLocal,
        );
        assert_eq!(out, json!({"model": "sonnet", "theme": "dark"}));
    }

    #[test]
    fn test_smart_asks_per_registry_conflict() {
        let mut prompter =
            ScriptedPrompter::with_keys(&[KeyChoice::TakeRemote, KeyChoice::TakeLocal]);
        let merged = merge_documents(
            doc(json!({"mcpServers": {"a": 1, "b": 1, "c": 1}})),
            doc(json!({"mcpServers": {"a": 2, "b": 2, "c": 1}})),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut prompter,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(
            Value::Object(merged.document),
            json!({"mcpServers": {"a": 2, "b": 1, "c": 1}})
        );
        assert_eq!(prompter.asked_keys, vec!["mcpServers.a", "mcpServers.b"]);
        assert_eq!(merged.stats.prompts, 2);
    }

    #[test]
    fn test_smart_bulk_choice_stops_prompting() {
        let mut prompter = ScriptedPrompter::with_keys(&[KeyChoice::TakeRemoteForAll]);
        let merged = merge_documents(
            doc(json!({
                "mcpServers": {"a": 1, "b": 1},
                "projects": {"/w": {"mcpServers": {"p": 1}}}
            })),
            doc(json!({
                "mcpServers": {"a": 2, "b": 2},
                "projects": {"/w": {"mcpServers": {"p": 2}}}
            })),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut prompter,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(prompter.asked_keys.len(), 1);
        assert_eq!(merged.confirmation.bulk_side(), Some(Side::Remote));
        assert_eq!(
            Value::Object(merged.document),
            json!({
                "mcpServers": {"a": 2, "b": 2},
                "projects": {"/w": {"mcpServers": {"p": 2}}}
            })
        );
    }

    #[test]
    fn test_smart_auto_confirm_keeps_local() {
        let mut prompter = ScriptedPrompter::default();
        let merged = merge_documents(
            doc(json!({"mcpServers": {"a": 1}})),
            doc(json!({"mcpServers": {"a": 2}})),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut prompter,
            ConfirmationPolicy::auto(),
        );
        assert_eq!(Value::Object(merged.document), json!({"mcpServers": {"a": 1}}));
        assert!(prompter.asked_keys.is_empty());
    }

    #[test]
    fn test_project_registry_context_is_reported() {
        let mut prompter = ScriptedPrompter::with_keys(&[KeyChoice::TakeLocal]);
        merge_documents(
            doc(json!({"projects": {"/work/app": {"mcpServers": {"db": 1}, "history": [1]}}})),
            doc(json!({"projects": {"/work/app": {"mcpServers": {"db": 2}, "history": [2]}}})),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut prompter,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(prompter.asked_keys, vec!["projects./work/app.mcpServers.db"]);
    }

    #[test]
    fn test_smart_merge_is_idempotent() {
        let local = json!({"mcpServers": {"a": 1, "b": 1}, "model": "sonnet"});
        let remote = json!({"mcpServers": {"a": 2, "c": 3}, "model": "opus"});

        let mut first = ScriptedPrompter::with_keys(&[KeyChoice::TakeLocal]);
        let once = merge_documents(
            doc(local),
            doc(remote.clone()),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut first,
            ConfirmationPolicy::interactive(),
        );

        // Same inputs and the same answer give the same result.
        let mut second = ScriptedPrompter::with_keys(&[KeyChoice::TakeLocal]);
        let again = merge_documents(
            once.document.clone(),
            doc(remote),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut second,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(again.document, once.document);

        // Once the remote reflects the result, nothing is asked at all.
        let mut third = ScriptedPrompter::default();
        let settled = merge_documents(
            once.document.clone(),
            once.document.clone(),
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut third,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(settled.document, once.document);
        assert!(third.asked_keys.is_empty());
    }

    #[test]
    fn test_malformed_side_is_empty() {
        let merged = merge_str(
            "{broken",
            r#"{"mcpServers":{"a":1}}"#,
            MergePolicy::Smart,
            MergeSchema::PREFERENCES,
            &mut NoPrompt,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(Value::Object(merged.document), json!({"mcpServers": {"a": 1}}));

        let merged = merge_str(
            r#"{"model":"opus"}"#,
            "",
            MergePolicy::PreferRemote,
            MergeSchema::FLAT,
            &mut NoPrompt,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(Value::Object(merged.document), json!({"model": "opus"}));
    }

    #[test]
    fn test_flat_schema_treats_registries_as_opaque() {
        let merged = merge_documents(
            doc(json!({"mcpServers": {"a": 1, "b": 1}})),
            doc(json!({"mcpServers": {"a": 2}})),
            MergePolicy::PreferRemote,
            MergeSchema::FLAT,
            &mut NoPrompt,
            ConfirmationPolicy::interactive(),
        );
        assert_eq!(Value::Object(merged.document), json!({"mcpServers": {"a": 2}}));
    }

    #[test]
    fn test_fold_project_servers() {
        let mut prefs = doc(json!({
            "mcpServers": {"shared": {"command": "global"}},
            "projects": {
                "/a": {"mcpServers": {"shared": {"command": "project"}, "db": {"command": "pg"}}},
                "/b": {"allowedTools": []}
            }
        }));
        assert!(fold_project_servers(&mut prefs));
        assert_eq!(
            prefs["mcpServers"],
            json!({"shared": {"command": "global"}, "db": {"command": "pg"}})
        );
        assert!(!fold_project_servers(&mut prefs));
    }

    #[test]
    fn test_apply_global_servers_keeps_project_entries() {
        let mut prefs = doc(json!({
            "mcpServers": {"db": {"command": "global-db"}, "web": {"command": "w"}},
            "projects": {
                "/work/app": {"mcpServers": {"db": {"command": "project-db"}}, "allowedTools": ["x"]}
            }
        }));
        let applied = apply_global_servers(&mut prefs, "/work/app", false).unwrap();
        assert!(applied.changed());
        assert_eq!(applied.servers, 2);
        assert_eq!(
            prefs["projects"]["/work/app"],
            json!({
                "mcpServers": {"db": {"command": "project-db"}, "web": {"command": "w"}},
                "allowedTools": ["x"]
            })
        );

        let again = apply_global_servers(&mut prefs, "/work/app", false).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn test_apply_global_servers_overwrite_replaces_registry() {
        let mut prefs = doc(json!({
            "mcpServers": {"db": {"command": "global-db"}},
            "projects": {"/p": {"mcpServers": {"db": {"command": "old"}, "extra": {}}}}
        }));
        let applied = apply_global_servers(&mut prefs, "/p", true).unwrap();
        assert!(applied.changed());
        assert!(applied.before.contains("extra"));
        assert_eq!(
            prefs["projects"]["/p"]["mcpServers"],
            json!({"db": {"command": "global-db"}})
        );
    }

    #[test]
    fn test_apply_global_servers_creates_project_entry() {
        let mut prefs = doc(json!({"mcpServers": {"db": {"command": "pg"}}}));
        let applied = apply_global_servers(&mut prefs, "/new", false).unwrap();
        assert_eq!(applied.before, "{}");
        assert_eq!(prefs["projects"]["/new"]["mcpServers"]["db"]["command"], "pg");
    }

    #[test]
    fn test_apply_without_global_servers_is_a_no_op() {
        let original = json!({"mcpServers": {}, "projects": {}});
        let mut prefs = doc(original.clone());
        assert!(apply_global_servers(&mut prefs, "/p", false).is_none());
        assert_eq!(Value::Object(prefs), original);
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: MergePolicy = serde_json::from_str("\"merge\"").unwrap();
        assert_eq!(policy, MergePolicy::Smart);
        assert_eq!(serde_json::to_string(&MergePolicy::PreferLocal).unwrap(), "\"local\"");
    }
}
