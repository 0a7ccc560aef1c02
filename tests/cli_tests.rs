//! CLI integration tests for the `delve` binary.
//!
//! Every test runs in its own temporary directory so no `delve.toml` from the
//! repository leaks in.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_delve(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_delve"))
        .args(args)
        .arg("--no-color")
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute delve")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["--help"], dir.path());

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Delve"));
    for command in ["serve", "research", "init", "config"] {
        assert!(text.contains(command), "missing {} in help", command);
    }
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["--version"], dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// Init
// =============================================================================

#[test]
fn test_init_writes_starter_files() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["init", "--provider", "ollama"], dir.path());

    assert!(output.status.success());
    let toml = fs::read_to_string(dir.path().join("delve.toml")).unwrap();
    assert!(toml.contains("[research]"));
    assert!(toml.contains("[llm]"));
    assert!(dir.path().join(".env.example").exists());
    assert!(dir.path().join(".gitignore").exists());
}

#[test]
fn test_init_keeps_existing_config_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("delve.toml"), "# mine\n").unwrap();

    let output = run_delve(&["init"], dir.path());
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("delve.toml")).unwrap(),
        "# mine\n"
    );

    let output = run_delve(&["init", "--force"], dir.path());
    assert!(output.status.success());
    assert!(
        fs::read_to_string(dir.path().join("delve.toml"))
            .unwrap()
            .contains("[server]")
    );
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_validate_after_init() {
    let dir = TempDir::new().unwrap();
    assert!(run_delve(&["init"], dir.path()).status.success());

    let output = run_delve(&["config", "--validate"], dir.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn test_config_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bad.toml"),
        "[research]\nmax_concurrency = 0\n",
    )
    .unwrap();

    let output = run_delve(&["config", "-c", "bad.toml"], dir.path());
    assert!(!output.status.success());
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["config", "-c", "nowhere.toml"], dir.path());
    assert!(!output.status.success());
}

// =============================================================================
// Research
// =============================================================================

#[test]
fn test_research_prints_cited_report() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(
        &["research", "Impact", "of", "tariffs", "on", "semiconductors"],
        dir.path(),
    );

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("# Research report"));
    assert!(text.contains("## Sources"));
}

#[test]
fn test_research_json_output() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(
        &["research", "--json", "Impact of tariffs on semiconductors"],
        dir.path(),
    );

    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["state"], "completed");
    assert_eq!(body["query_id"], 1);
    assert!(!body["report"]["citations"].as_array().unwrap().is_empty());
}

#[test]
fn test_research_blank_query_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let output = run_delve(&["research", "   "], dir.path());
    assert!(!output.status.success());
}
