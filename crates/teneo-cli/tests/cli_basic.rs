//! Basic CLI E2E tests.
//!
//! Every invocation gets its own state and config files in a temp dir,
//! so nothing touches the user's real configuration.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run a CLI command against files in `dir` and return (stdout, stderr, code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_teneo-cli"))
        .arg("--state-file")
        .arg(dir.join("localStorage.json"))
        .arg("--config")
        .arg(dir.join("config.toml"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn status_json(dir: &Path) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(dir, &["status"]);
    assert_eq!(code, 0, "status failed: {stderr}");
    serde_json::from_str(&stdout).expect("status output is not JSON")
}

#[test]
fn test_status_without_state_file() {
    let dir = TempDir::new().unwrap();
    let status = status_json(dir.path());

    assert_eq!(status["state"]["userId"], "");
    assert_eq!(status["state"]["pointsTotal"], 0);
    assert_eq!(status["estimate"]["countdown"], "Calculating...");
    assert_eq!(status["estimate"]["points"], 0.0);
}

#[test]
fn test_status_reads_existing_state() {
    let dir = TempDir::new().unwrap();
    let heartbeat = chrono::Utc::now() - chrono::Duration::minutes(20);
    let record = serde_json::json!({
        "lastUpdated": heartbeat.to_rfc3339(),
        "pointsTotal": 300,
        "pointsToday": 25,
        "userId": "user-1",
    });
    std::fs::write(dir.path().join("localStorage.json"), record.to_string()).unwrap();

    let status = status_json(dir.path());

    assert_eq!(status["state"]["userId"], "user-1");
    assert_eq!(status["state"]["pointsTotal"], 300);
    assert_eq!(status["estimate"]["countdown"], "Calculating...");
    assert_eq!(status["estimate"]["points"], 25.0);
}

#[test]
fn test_corrupt_state_file_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("localStorage.json"), "{not json").unwrap();

    let (_, stderr, code) = run_cli(dir.path(), &["status"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
}

#[test]
fn test_run_without_identity_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["run"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("No stored user ID"), "stderr: {stderr}");
}

#[test]
fn test_run_with_blank_user_id_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["run", "--user-id", "   "]);
    assert_eq!(code, 1);
    assert!(stderr.contains("must not be empty"), "stderr: {stderr}");
    assert!(!dir.path().join("localStorage.json").exists());
}

#[test]
fn test_logout_removes_state_file() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("localStorage.json");
    std::fs::write(&state_file, r#"{"userId":"user-1"}"#).unwrap();

    let (stdout, stderr, code) = run_cli(dir.path(), &["logout"]);
    assert_eq!(code, 0, "logout failed: {stderr}");
    assert!(stdout.contains("logged out"));
    assert!(!state_file.exists());
}

#[test]
fn test_config_get_default() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "node.version"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "v0.2");
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_set_persists() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "reconnect.enabled", "true"]);
    assert_eq!(code, 0, "config set failed: {stderr}");

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "reconnect.enabled"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "true");
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "node.ping_interval_secs", "soon"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(dir.path(), &["config", "get", "node.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();
    let _ = run_cli(dir.path(), &["config", "set", "node.version", "v9"]);

    let (_, _, code) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    let config: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(config["node"]["version"], "v0.2");
    assert_eq!(config["rewards"]["tick_interval_secs"], 1);
}
