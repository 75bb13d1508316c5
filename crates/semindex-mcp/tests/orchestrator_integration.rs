//! Integration tests for the semindex MCP crate.
//!
//! Tool-parameter (de)serialization and `ServerConfig` construction run
//! unconditionally. Tests that construct a live `Orchestrator` need a
//! reachable Qdrant instance and an embedding model and are `#[ignore]`d.

use std::path::PathBuf;

use semindex_config::SemindexConfig;
use semindex_mcp::{Orchestrator, ServerConfig};
use semindex_mcp::tools::{
    ClearIndexParams, CodebaseSearchParams, ReindexMode, ReindexParams, ValidateComponent,
    ValidateConfigParams,
};
use tempfile::TempDir;

fn setup_workspace() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        temp.path().join("lib.rs"),
        "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n",
    )
    .unwrap();
    temp
}

// ============================================================================
// ServerConfig Tests
// ============================================================================

#[test]
fn test_server_config_new_uses_default_config() {
    let workspace = setup_workspace();
    let config = ServerConfig::new(workspace.path());

    assert_eq!(config.workspace_root, workspace.path());
    assert_eq!(config.config.qdrant.url, SemindexConfig::default().qdrant.url);
}

#[test]
fn test_server_config_load_without_local_config_falls_back_to_defaults() {
    let workspace = setup_workspace();
    let config = ServerConfig::load(workspace.path()).expect("load should succeed with no config files");

    assert_eq!(config.workspace_root, PathBuf::from(workspace.path()));
    assert_eq!(config.config.embedding.provider, SemindexConfig::default().embedding.provider);
}

// ============================================================================
// Tool Parameter (De)Serialization Tests
// ============================================================================

#[test]
fn test_reindex_mode_default_is_incremental() {
    assert_eq!(ReindexMode::default(), ReindexMode::Incremental);
}

#[test]
fn test_reindex_params_deserializes_from_minimal_json() {
    let params: ReindexParams = serde_json::from_str(r#"{}"#).unwrap();
    assert_eq!(params.mode, ReindexMode::Incremental);
    assert!(!params.force);
    assert!(params.paths.is_none());
}

#[test]
fn test_reindex_params_file_mode_with_paths() {
    let params: ReindexParams =
        serde_json::from_str(r#"{"mode": "file", "paths": ["src/lib.rs"], "force": true}"#)
            .unwrap();
    assert_eq!(params.mode, ReindexMode::File);
    assert_eq!(params.paths.unwrap(), vec!["src/lib.rs".to_string()]);
    assert!(params.force);
}

#[test]
fn test_validate_component_default_is_all() {
    assert_eq!(ValidateComponent::default(), ValidateComponent::All);
}

#[test]
fn test_validate_config_params_deserializes_component() {
    let params: ValidateConfigParams = serde_json::from_str(r#"{"component": "qdrant"}"#).unwrap();
    assert_eq!(params.component, ValidateComponent::Qdrant);
}

#[test]
fn test_clear_index_params_requires_confirm_field() {
    let params: ClearIndexParams = serde_json::from_str(r#"{"confirm": true}"#).unwrap();
    assert!(params.confirm);
    assert!(params.workspace.is_none());
}

#[test]
fn test_codebase_search_params_optional_fields_default_to_none() {
    let params: CodebaseSearchParams =
        serde_json::from_str(r#"{"query": "retry with backoff"}"#).unwrap();
    assert_eq!(params.query, "retry with backoff");
    assert!(params.limit.is_none());
    assert!(params.threshold.is_none());
    assert!(params.file_types.is_none());
}

// ============================================================================
// Orchestrator Integration Tests - require a reachable Qdrant instance
// ============================================================================

#[tokio::test]
#[ignore = "requires a running Qdrant instance and embedding model"]
async fn test_orchestrator_initial_index_then_handle_change() {
    let workspace = setup_workspace();
    let mut config = SemindexConfig::default();
    config.indexing.auto_index = false;

    let orchestrator = Orchestrator::new(workspace.path().to_path_buf(), config)
        .await
        .expect("orchestrator should initialize");

    let indexer = orchestrator.indexer();
    indexer
        .index_all(semindex_mcp::IndexOptions::default())
        .await
        .expect("initial index should succeed");

    let state = indexer.get_state();
    assert!(state.stats.total_files > 0);

    let event = semindex_search::WatchEvent {
        path: workspace.path().join("lib.rs"),
        kind: semindex_search::WatchEventKind::Modified,
    };
    indexer
        .handle_change(event)
        .await
        .expect("incremental reindex should succeed");
}

#[tokio::test]
#[ignore = "requires a running Qdrant instance and embedding model"]
async fn test_orchestrator_reconfigure_swaps_indexer() {
    let workspace = setup_workspace();
    let mut config = SemindexConfig::default();
    config.indexing.auto_index = false;

    let orchestrator = Orchestrator::new(workspace.path().to_path_buf(), config)
        .await
        .expect("orchestrator should initialize");

    let overrides = semindex_config::ConfigOverrides {
        qdrant_url: Some("http://localhost:6334".to_string()),
        ..Default::default()
    };

    orchestrator
        .reconfigure(overrides)
        .await
        .expect("reconfigure should succeed against a reachable Qdrant");
}
