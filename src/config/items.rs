//! Item descriptors: what gets synced and how.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sync::FieldFilter;

/// File or directory. Directories travel as packed archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    File,
    Directory,
}

/// Role-specific canonicalization and merge behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    /// No special handling.
    Plain,
    /// Editor settings: device-specific hooks are stripped.
    Settings,
    /// Application preferences: project server registries are folded into
    /// the global registry and the registry is merged per server.
    Preferences,
}

/// One configured item. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Unique item name.
    pub name: String,
    /// Local path; a leading `~` expands to the home directory.
    pub local_path: String,
    /// Blob key on the remote.
    #[serde(alias = "gist_file")]
    pub remote_key: String,
    #[serde(default, alias = "type")]
    pub kind: ItemKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FieldFilter>,
    /// Explicit role; inferred from the name and path when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ItemRole>,
}

const fn default_enabled() -> bool {
    true
}

impl ItemDescriptor {
    /// A plain file item.
    #[must_use]
    pub fn file(name: &str, local_path: &str, remote_key: &str) -> Self {
        Self {
            name: name.to_string(),
            local_path: local_path.to_string(),
            remote_key: remote_key.to_string(),
            kind: ItemKind::File,
            enabled: true,
            filter: None,
            role: None,
        }
    }

    /// A directory item.
    #[must_use]
    pub fn directory(name: &str, local_path: &str, remote_key: &str) -> Self {
        Self {
            kind: ItemKind::Directory,
            ..Self::file(name, local_path, remote_key)
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: ItemRole) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Effective role of the item.
    ///
    /// Directory items are always plain. For files without an explicit
    /// role, `settings` / `settings.json` select [`ItemRole::Settings`] and
    /// `claude-json` / `.claude.json` select [`ItemRole::Preferences`].
    #[must_use]
    pub fn role(&self) -> ItemRole {
        if self.kind == ItemKind::Directory {
            return ItemRole::Plain;
        }
        if let Some(role) = self.role {
            return role;
        }
        let basename = Path::new(&self.local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.name == "settings" || basename == "settings.json" {
            ItemRole::Settings
        } else if self.name == "claude-json" || basename == ".claude.json" {
            ItemRole::Preferences
        } else {
            ItemRole::Plain
        }
    }

    /// Whether the item's content is treated as a JSON document.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.kind == ItemKind::File && (self.filter.is_some() || self.role() != ItemRole::Plain)
    }

    /// Expanded local path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        super::expand_path(&self.local_path)
    }
}

/// Items shipped in a fresh config.
#[must_use]
pub fn default_items() -> Vec<ItemDescriptor> {
    vec![
        ItemDescriptor::file("settings", "~/.claude/settings.json", "settings.json")
            .with_filter(FieldFilter::Exclude(vec!["env".into()])),
        ItemDescriptor::directory("output-styles", "~/.claude/output-styles", "output-styles.tar.gz"),
        ItemDescriptor::directory("plans", "~/.claude/plans", "plans.tar.gz").disabled(),
        ItemDescriptor::directory("todos", "~/.claude/todos", "todos.tar.gz").disabled(),
        ItemDescriptor::file("claude-json", "~/.claude.json", "claude.json").with_filter(
            FieldFilter::Include(
                [
                    "model",
                    "autoUpdates",
                    "showExpandedTodos",
                    "thinkingMigrationComplete",
                    "mcp",
                    "mcpServers",
                ]
                .map(String::from)
                .to_vec(),
            ),
        ),
        ItemDescriptor::file(
            "plugins-list",
            "~/.claude/plugins/known_marketplaces.json",
            "known_marketplaces.json",
        ),
        ItemDescriptor::directory("skills", "~/.claude/skills", "skills.tar.gz"),
    ]
}
