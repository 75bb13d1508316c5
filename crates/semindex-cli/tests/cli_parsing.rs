//! CLI parsing tests for the semindex command
//!
//! Tests that verify CLI argument parsing works correctly without touching
//! a real workspace or Qdrant instance.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the semindex binary
fn semindex() -> Command {
    Command::cargo_bin("semindex").expect("Failed to find semindex binary")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    semindex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("mcp"));
}

#[test]
fn test_version_flag() {
    semindex()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("semindex"));
}

#[test]
fn test_no_command_prints_usage_error() {
    semindex().assert().failure();
}

// ============================================================================
// Global Options Tests
// ============================================================================

#[test]
fn test_global_options_in_help() {
    semindex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workspace"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"))
        .stdout(predicate::str::contains("--qdrant-url"))
        .stdout(predicate::str::contains("--embedding-provider"));
}

#[test]
fn test_conflicting_verbose_quiet_not_prevented() {
    // clap doesn't prevent both by default; this just verifies both flags parse
    semindex()
        .args(["--verbose", "--quiet", "--help"])
        .assert()
        .success();
}

#[test]
fn test_invalid_embedding_provider_rejected() {
    semindex()
        .args(["--embedding-provider", "not-a-provider", "status"])
        .assert()
        .failure();
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn test_init_help() {
    semindex()
        .args(["init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--no-index"));
}

// ============================================================================
// Index Command Tests
// ============================================================================

#[test]
fn test_index_help() {
    semindex()
        .args(["index", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--paths"));
}

// ============================================================================
// Search Command Tests
// ============================================================================

#[test]
fn test_search_help() {
    semindex()
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--min-score"))
        .stdout(predicate::str::contains("--types"))
        .stdout(predicate::str::contains("--languages"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--snippets"))
        .stdout(predicate::str::contains("--files-only"));
}

#[test]
fn test_search_requires_query() {
    semindex().arg("search").assert().failure();
}

#[test]
fn test_search_invalid_output_format_rejected() {
    semindex()
        .args(["search", "some query", "--output", "xml"])
        .assert()
        .failure();
}

// ============================================================================
// Status Command Tests
// ============================================================================

#[test]
fn test_status_help() {
    semindex()
        .args(["status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--show-config"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_help_lists_subcommands() {
    semindex()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("path"));
}

#[test]
fn test_config_get_requires_key() {
    semindex().args(["config", "get"]).assert().failure();
}

#[test]
fn test_config_set_requires_key_and_value() {
    semindex()
        .args(["config", "set", "qdrant.url"])
        .assert()
        .failure();
}

// ============================================================================
// Clean Command Tests
// ============================================================================

#[test]
fn test_clean_help() {
    semindex()
        .args(["clean", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--local-only"))
        .stdout(predicate::str::contains("--backend-only"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// MCP Command Tests
// ============================================================================

#[test]
fn test_mcp_help() {
    semindex()
        .args(["mcp", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--root"))
        .stdout(predicate::str::contains("--log-file"))
        .stdout(predicate::str::contains("--debug"));
}
