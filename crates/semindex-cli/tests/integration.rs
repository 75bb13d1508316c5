//! Integration tests for the semindex CLI
//!
//! These exercise full CLI workflows against a scratch workspace. Tests that
//! only touch local config files run unconditionally; tests that need a
//! reachable Qdrant instance or an embedding model are marked `#[ignore]`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn semindex() -> Command {
    Command::cargo_bin("semindex").expect("Failed to find semindex binary")
}

/// Create a temporary workspace with a couple of source files.
fn setup_workspace() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        temp.path().join("lib.rs"),
        "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n",
    )
    .unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(
        temp.path().join("src/main.rs"),
        "fn main() {\n    println!(\"hello\");\n}\n",
    )
    .unwrap();
    temp
}

// ============================================================================
// Init Command Integration Tests
// ============================================================================

#[test]
fn test_init_creates_local_config() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    assert!(workspace.path().join(".semindex/config.toml").exists());
}

#[test]
fn test_init_without_force_fails_when_already_initialized() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_init_force_reinitializes() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index", "--force"])
        .assert()
        .success();
}

// ============================================================================
// Config Command Integration Tests
// ============================================================================

#[test]
fn test_config_path_reports_local_file() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".semindex"));
}

#[test]
fn test_config_set_and_get_roundtrip() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["config", "set", "indexing.concurrency", "3"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["config", "get", "indexing.concurrency"])
        .assert()
        .success()
        .stdout(predicate::str::contains('3'));
}

#[test]
fn test_config_set_unknown_key_fails() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["config", "set", "nonexistent.key", "value"])
        .assert()
        .failure();
}

#[test]
fn test_config_list_json_is_valid() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    let output = semindex()
        .current_dir(workspace.path())
        .args(["config", "list", "--json", "--effective"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("qdrant").is_some());
}

// ============================================================================
// Index / Search / Status / Clean - require a reachable Qdrant instance
// ============================================================================

#[test]
#[ignore = "requires a running Qdrant instance and embedding model"]
fn test_index_and_search_roundtrip() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["index", "--force"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["search", "add two numbers"])
        .assert()
        .success();
}

#[test]
#[ignore = "requires a running Qdrant instance and embedding model"]
fn test_status_json_after_index() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stats\""));
}

#[test]
#[ignore = "requires a running Qdrant instance"]
fn test_clean_dry_run_reports_no_changes() {
    let workspace = setup_workspace();

    semindex()
        .current_dir(workspace.path())
        .args(["init", "--no-index"])
        .assert()
        .success();

    semindex()
        .current_dir(workspace.path())
        .args(["clean", "--dry-run", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run complete"));
}
