//! Integration tests for the confsync binary.
//!
//! Each test builds one or two "machines" (a temp HOME plus config
//! directory) that share a directory remote.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Machine {
    home: TempDir,
}

impl Machine {
    fn new() -> Self {
        Self {
            home: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("confsync"));
        cmd.env("HOME", self.home.path())
            .env("CONFSYNC_HOME", self.home.path().join(".confsync"))
            .env_remove("RUST_LOG")
            .env_remove("GITHUB_TOKEN");
        cmd
    }

    fn settings(&self) -> PathBuf {
        self.home.path().join(".claude/settings.json")
    }

    fn write_settings(&self, content: &str) {
        let path = self.settings();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn init(&self, remote: &Path) {
        self.cmd()
            .args(["init", "--remote-dir"])
            .arg(remote)
            .assert()
            .success();
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).arg("--json").output().unwrap();
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn item<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["name"] == name)
        .unwrap()
}

// ============================================================================
// Setup
// ============================================================================

#[test]
fn test_version_json() {
    let machine = Machine::new();
    machine
        .cmd()
        .args(["version", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\""));
}

#[test]
fn test_status_before_init() {
    let machine = Machine::new();
    machine
        .cmd()
        .args(["status", "--json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NOT_INITIALIZED"));
}

#[test]
fn test_init_writes_config_and_tags_remote() {
    let machine = Machine::new();
    let remote = TempDir::new().unwrap();
    machine.init(remote.path());

    assert!(machine.home.path().join(".confsync/config.json").exists());
    let meta = fs::read_to_string(remote.path().join("confsync.meta.json")).unwrap();
    assert!(meta.contains("confsync:"));

    machine
        .cmd()
        .args(["init", "--remote-dir"])
        .arg(remote.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ALREADY_INITIALIZED"));
}

#[test]
fn test_config_enable_unknown_item() {
    let machine = Machine::new();
    let remote = TempDir::new().unwrap();
    machine.init(remote.path());

    machine
        .cmd()
        .args(["config", "enable", "nope", "--json"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("UNKNOWN_ITEM"));

    let enabled = machine.json(&["config", "enable", "plans"]);
    assert_eq!(enabled["enabled"], true);
    let config = machine.json(&["config", "show"]);
    let plans = config["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["name"] == "plans")
        .unwrap();
    assert_eq!(plans["enabled"], true);
}

#[test]
fn test_login_stores_token() {
    let machine = Machine::new();
    machine
        .cmd()
        .args(["login", "--token", "ghp_example"])
        .assert()
        .success();
    let token = fs::read_to_string(machine.home.path().join(".confsync/token")).unwrap();
    assert_eq!(token.trim(), "ghp_example");
}

// ============================================================================
// Push / pull
// ============================================================================

#[test]
fn test_push_then_pull_on_second_machine() {
    let remote = TempDir::new().unwrap();
    let a = Machine::new();
    let b = Machine::new();
    a.write_settings(r#"{"model": "opus", "env": {"API_KEY": "secret"}}"#);
    a.init(remote.path());
    b.init(remote.path());

    let pushed = a.json(&["push"]);
    assert_eq!(item(&pushed, "settings")["outcome"], "pushed");
    assert_eq!(pushed["version_after"], 1);

    let uploaded = fs::read_to_string(remote.path().join("settings.json")).unwrap();
    assert!(uploaded.contains("opus"));
    assert!(!uploaded.contains("secret"));

    let pulled = b.json(&["pull", "--yes"]);
    assert_eq!(item(&pulled, "settings")["outcome"], "pulled");
    let local: Value = serde_json::from_str(&fs::read_to_string(b.settings()).unwrap()).unwrap();
    assert_eq!(local["model"], "opus");

    let status = b.json(&["status"]);
    assert_eq!(status["direction"], "synced");
    assert_eq!(item(&status, "settings")["status"], "synced");

    let status = a.json(&["status"]);
    assert_eq!(status["direction"], "synced");
}

#[test]
fn test_push_dry_run_writes_nothing() {
    let remote = TempDir::new().unwrap();
    let machine = Machine::new();
    machine.write_settings(r#"{"model": "opus"}"#);
    machine.init(remote.path());

    let report = machine.json(&["push", "--dry-run"]);
    assert_eq!(report["dry_run"], true);
    assert_eq!(item(&report, "settings")["outcome"], "planned");
    assert!(!remote.path().join("settings.json").exists());
    assert!(!machine.home.path().join(".confsync/state.json").exists());
}

#[test]
fn test_push_refused_when_remote_ahead() {
    let remote = TempDir::new().unwrap();
    let a = Machine::new();
    let b = Machine::new();
    a.write_settings(r#"{"model": "opus"}"#);
    b.write_settings(r#"{"model": "opus"}"#);
    a.init(remote.path());
    b.init(remote.path());
    a.json(&["push"]);
    b.json(&["pull", "--yes"]);

    a.write_settings(r#"{"model": "haiku"}"#);
    a.json(&["push"]);

    b.write_settings(r#"{"model": "sonnet"}"#);
    b.cmd()
        .args(["push", "--json"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("refused"))
        .stderr(predicate::str::contains("SYNC_INCOMPLETE"));

    let remote_settings = fs::read_to_string(remote.path().join("settings.json")).unwrap();
    assert!(remote_settings.contains("haiku"));
}

// ============================================================================
// MCP apply
// ============================================================================

impl Machine {
    fn claude_json(&self) -> PathBuf {
        self.home.path().join(".claude.json")
    }

    /// A project directory under HOME, resolved the way the binary sees
    /// its working directory.
    fn project(&self) -> PathBuf {
        let dir = self.home.path().join("work/app");
        fs::create_dir_all(&dir).unwrap();
        fs::canonicalize(dir).unwrap()
    }

    fn read_claude_json(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(self.claude_json()).unwrap()).unwrap()
    }
}

fn project_key(project: &Path) -> String {
    project.to_string_lossy().into_owned()
}

#[test]
fn test_mcp_apply_adds_missing_servers_only() {
    let machine = Machine::new();
    let project = machine.project();
    let key = project_key(&project);
    fs::write(
        machine.claude_json(),
        serde_json::json!({
            "mcpServers": {"db": {"command": "global-db"}, "web": {"command": "w"}},
            "projects": {key.clone(): {"mcpServers": {"db": {"command": "project-db"}}}}
        })
        .to_string(),
    )
    .unwrap();

    let output = machine
        .cmd()
        .args(["mcp-apply", "--json"])
        .current_dir(&project)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["result"], "applied");
    assert_eq!(result["mode"], "merge");
    assert_eq!(result["servers"], 2);

    let prefs = machine.read_claude_json();
    let servers = &prefs["projects"][key.as_str()]["mcpServers"];
    assert_eq!(servers["db"]["command"], "project-db");
    assert_eq!(servers["web"]["command"], "w");

    machine
        .cmd()
        .args(["mcp-apply", "--json"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"up_to_date\""));
    machine
        .cmd()
        .args(["mcp-apply", "--silent"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_mcp_apply_overwrite_replaces_project_servers() {
    let machine = Machine::new();
    let project = machine.project();
    let key = project_key(&project);
    fs::write(
        machine.claude_json(),
        serde_json::json!({
            "mcpServers": {"db": {"command": "global-db"}},
            "projects": {key.clone(): {"mcpServers": {"db": {"command": "old"}, "extra": {}}}}
        })
        .to_string(),
    )
    .unwrap();

    machine
        .cmd()
        .args(["mcp-apply", "--yes", "--overwrite", "--json"])
        .current_dir(&project)
        .assert()
        .success();

    let prefs = machine.read_claude_json();
    assert_eq!(
        prefs["projects"][key.as_str()]["mcpServers"],
        serde_json::json!({"db": {"command": "global-db"}})
    );
}

#[test]
fn test_mcp_apply_without_global_servers() {
    let machine = Machine::new();
    let project = machine.project();
    let original = r#"{"model": "opus"}"#;
    fs::write(machine.claude_json(), original).unwrap();

    machine
        .cmd()
        .args(["mcp-apply", "--json"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"no_global_servers\""));
    assert_eq!(fs::read_to_string(machine.claude_json()).unwrap(), original);
}

#[test]
fn test_pull_apply_mcp_after_pull() {
    let remote = TempDir::new().unwrap();
    let a = Machine::new();
    let b = Machine::new();
    fs::write(
        a.claude_json(),
        r#"{"model": "opus", "mcpServers": {"db": {"command": "pg"}}}"#,
    )
    .unwrap();
    a.init(remote.path());
    b.init(remote.path());
    a.json(&["push"]);

    let project = b.project();
    let output = b
        .cmd()
        .args(["pull", "--yes", "--apply-mcp", "--json"])
        .current_dir(&project)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(item(&lines[0], "claude-json")["outcome"], "pulled");
    assert_eq!(lines[1]["result"], "applied");

    let prefs = b.read_claude_json();
    assert_eq!(prefs["mcpServers"]["db"]["command"], "pg");
    let key = project_key(&project);
    assert_eq!(prefs["projects"][key.as_str()]["mcpServers"]["db"]["command"], "pg");
}
