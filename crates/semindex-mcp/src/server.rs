//! semindex MCP server implementation.
//!
//! Exposes the six codebase-search/indexing tools over the `rmcp` SDK:
//! `codebase_search`, `indexing_status`, `reindex`, `configure_indexer`,
//! `clear_index`, `validate_config`.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use semindex_config::{ConfigOverrides, SemindexConfig};
use semindex_search::{extract_context, SearchQuery, SemanticSearch};

use crate::orchestrator::{IndexOptions, Orchestrator};
use crate::tools::*;

/// Server configuration: a workspace root plus the merged configuration to
/// drive the orchestrator with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub workspace_root: PathBuf,
    pub config: SemindexConfig,
}

impl ServerConfig {
    /// Load configuration by layering the global `~/.semindex/config.toml`
    /// over the workspace-local `.semindex/config.toml`, per
    /// `ConfigLoader::load`'s precedence.
    pub fn load(workspace_root: impl Into<PathBuf>) -> Result<Self, semindex_config::ConfigError> {
        let workspace_root = workspace_root.into();
        let mut loader = semindex_config::ConfigLoader::new();
        let config = loader.load(&workspace_root, None)?;
        Ok(Self { workspace_root, config })
    }

    /// Use a workspace root with the default configuration, skipping disk
    /// lookups entirely. Useful for tests and ad-hoc CLI invocations.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            config: SemindexConfig::default(),
        }
    }
}

/// semindex MCP server exposing codebase search and indexing tools.
#[derive(Clone)]
pub struct PrismServer {
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
    shutdown_tx: watch::Sender<bool>,
}

#[tool_router]
impl PrismServer {
    /// Build the orchestrator (which connects to Qdrant, builds the
    /// embedder, and starts the watchers) and spawn its initial index if
    /// `indexing.auto_index` is set.
    pub async fn new(config: ServerConfig) -> Result<Self, crate::McpError> {
        info!("initializing semindex MCP server");
        info!("  workspace: {}", config.workspace_root.display());
        info!("  qdrant: {}", config.config.qdrant.url);
        info!("  embedding provider: {}", config.config.embedding.provider);

        let orchestrator =
            Arc::new(Orchestrator::new(config.workspace_root, config.config).await?);

        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Ok(Self {
            orchestrator,
            tool_router: Self::tool_router(),
            shutdown_tx,
        })
    }

    /// Trigger graceful shutdown of the orchestrator's background watchers.
    pub fn shutdown(&self) {
        info!("shutdown signal sent to background tasks");
        let _ = self.shutdown_tx.send(true);
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            orchestrator.indexer().stop().await;
        });
    }

    // =========================================================================
    // MCP Tools
    // =========================================================================

    #[tool(
        name = "codebase_search",
        description = "Semantic search over the indexed codebase. Embeds the query and finds the most similar code blocks, optionally filtered by file type, path, directory, or language. Returns file, line, score, and (by default) surrounding source context for each hit."
    )]
    async fn codebase_search(
        &self,
        Parameters(params): Parameters<CodebaseSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let indexer = self.orchestrator.indexer();
        debug!(query = %params.query, "codebase_search");

        let query = SearchQuery {
            query: params.query.clone(),
            limit: params.limit.unwrap_or(10) as u64,
            score_threshold: Some(params.threshold.unwrap_or(0.7)),
            directory_prefix: params.directory_prefix,
            file_types: params.file_types.unwrap_or_default(),
            paths: params.paths.unwrap_or_default(),
            languages: params.languages.unwrap_or_default(),
            block_types: Vec::new(),
        };

        let search = SemanticSearch::new(indexer.store(), indexer.embedder());
        let results = search
            .search(&query)
            .await
            .map_err(|e| McpError::internal_error(format!("search failed: {e}"), None))?;

        let include_context = params.include_context.unwrap_or(true);
        let context_lines = params.context_lines.unwrap_or(3);

        let formatted: Vec<serde_json::Value> = results
            .iter()
            .map(|hit| {
                let code = if include_context {
                    extract_context(
                        indexer.root(),
                        &hit.file,
                        hit.line,
                        context_lines,
                        context_lines,
                        true,
                    )
                    .unwrap_or_else(|| hit.code.clone())
                } else {
                    hit.code.clone()
                };
                serde_json::json!({
                    "file": hit.file,
                    "line": hit.line,
                    "name": hit.name,
                    "block_type": hit.block_type,
                    "language": hit.language,
                    "score": hit.score,
                    "code": code,
                })
            })
            .collect();

        let response = serde_json::json!({
            "query": params.query,
            "result_count": formatted.len(),
            "results": formatted,
        });

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&response).unwrap_or_default(),
        )]))
    }

    #[tool(
        name = "indexing_status",
        description = "Check indexing status and progress: standby/indexing/indexed/error, files processed out of total, queue size, and accumulated stats. Pass detailed=true for the full error ring and per-language/file-type breakdowns."
    )]
    async fn indexing_status(
        &self,
        Parameters(params): Parameters<IndexingStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let state = self.orchestrator.indexer().get_state();

        let mut response = serde_json::json!({
            "status": format!("{:?}", state.progress.status).to_lowercase(),
            "is_running": state.is_running,
            "is_watching": state.is_watching,
            "current_branch": state.current_branch,
            "queue_size": state.queue_size,
            "progress": {
                "files_processed": state.progress.files_processed,
                "files_total": state.progress.files_total,
                "percentage": state.progress.percentage(),
                "current_file": state.progress.current_file,
            },
            "stats": {
                "total_blocks": state.stats.total_blocks,
                "total_vectors": state.stats.total_vectors,
                "total_files": state.stats.total_files,
                "last_indexed": state.stats.last_indexed,
            },
        });

        if params.detailed {
            response["stats"]["languages"] = serde_json::json!(state.stats.languages);
            response["stats"]["file_types"] = serde_json::json!(state.stats.file_types);
            response["stats"]["failure_rate_percent"] =
                serde_json::json!(state.stats.failure_rate_percent);
            response["errors"] = serde_json::json!(state.errors.iter().collect::<Vec<_>>());
        }

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&response).unwrap_or_default(),
        )]))
    }

    #[tool(
        name = "reindex",
        description = "Trigger a reindex. mode='incremental' (default) only reindexes changed files via the hash cache; mode='full' forces every file; mode='file' reindexes just the given paths. Runs in the background - use indexing_status to check completion."
    )]
    async fn reindex(
        &self,
        Parameters(params): Parameters<ReindexParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(mode = ?params.mode, "reindex requested");
        let indexer = self.orchestrator.indexer();

        if indexer.get_state().is_running {
            return Ok(CallToolResult::success(vec![Content::text(
                serde_json::to_string_pretty(&serde_json::json!({
                    "status": "already_running",
                    "message": "an indexing run is already in progress",
                }))
                .unwrap_or_default(),
            )]));
        }

        match params.mode {
            ReindexMode::File => {
                let paths = params.paths.clone().ok_or_else(|| {
                    McpError::invalid_params("mode \"file\" requires non-empty paths", None)
                })?;
                if paths.is_empty() {
                    return Err(McpError::invalid_params(
                        "mode \"file\" requires non-empty paths",
                        None,
                    ));
                }
                tokio::spawn(async move {
                    for path in paths {
                        if let Err(e) = indexer
                            .handle_change(semindex_search::WatchEvent {
                                path: indexer.root().join(&path),
                                kind: semindex_search::WatchEventKind::Modified,
                            })
                            .await
                        {
                            warn!(error = %e, path = %path, "file-mode reindex failed");
                        }
                    }
                });
            }
            ReindexMode::Incremental | ReindexMode::Full => {
                let force = params.force || params.mode == ReindexMode::Full;
                tokio::spawn(async move {
                    if let Err(e) = indexer.index_all(IndexOptions { force }).await {
                        warn!(error = %e, "reindex failed");
                    }
                });
            }
        }

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "started",
                "mode": params.mode,
                "message": "reindex started in the background; use indexing_status to check progress",
            }))
            .unwrap_or_default(),
        )]))
    }

    #[tool(
        name = "configure_indexer",
        description = "Change the embedding provider, Qdrant connection, or indexing concurrency at runtime. The candidate configuration is health-checked (provider dimension, Qdrant connectivity) before it replaces the live one; a failing check leaves the current configuration untouched."
    )]
    async fn configure_indexer(
        &self,
        Parameters(params): Parameters<ConfigureIndexerParams>,
    ) -> Result<CallToolResult, McpError> {
        let embedding_provider = params
            .provider
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: semindex_config::ConfigError| {
                McpError::invalid_params(e.to_string(), None)
            })?;

        let overrides = ConfigOverrides {
            codebase_path: None,
            qdrant_url: params.qdrant_config.as_ref().and_then(|q| q.url.clone()),
            qdrant_collection_name: params
                .qdrant_config
                .as_ref()
                .and_then(|q| q.collection_name.clone()),
            embedding_provider,
            log_level: None,
            concurrency: params.indexing_config.as_ref().and_then(|c| c.concurrency),
        };

        if !params.validate {
            warn!("configure_indexer called with validate=false; health checks still run because reconfigure always health-checks the candidate before swapping");
        }

        self.orchestrator
            .reconfigure(overrides)
            .await
            .map_err(|e| McpError::invalid_params(format!("configuration rejected: {e}"), None))?;

        let config = self.orchestrator.config();
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "applied",
                "provider": config.embedding.provider.to_string(),
                "qdrant_url": config.qdrant.url,
                "collection_name": config.qdrant.collection_name,
                "concurrency": config.indexing.concurrency,
            }))
            .unwrap_or_default(),
        )]))
    }

    #[tool(
        name = "clear_index",
        description = "Delete the active Qdrant collection. Requires confirm=true. Use before a from-scratch full reindex, or to recover from a corrupted index."
    )]
    async fn clear_index(
        &self,
        Parameters(params): Parameters<ClearIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        if !params.confirm {
            return Err(McpError::invalid_params(
                "clear_index requires confirm=true",
                None,
            ));
        }

        let indexer = self.orchestrator.indexer();
        let collection = self.orchestrator.config().qdrant.collection_name;
        indexer
            .store()
            .delete_collection(&collection)
            .await
            .map_err(|e| McpError::internal_error(format!("failed to clear index: {e}"), None))?;

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "cleared",
                "workspace": params.workspace,
                "collection": collection,
            }))
            .unwrap_or_default(),
        )]))
    }

    #[tool(
        name = "validate_config",
        description = "Health-check the Qdrant connection, the embedder (dimension match), or both. Use before configure_indexer to check a change will succeed, or to diagnose why indexing is stuck in an error state."
    )]
    async fn validate_config(
        &self,
        Parameters(params): Parameters<ValidateConfigParams>,
    ) -> Result<CallToolResult, McpError> {
        let indexer = self.orchestrator.indexer();
        let mut checks = serde_json::Map::new();

        if matches!(params.component, ValidateComponent::Qdrant | ValidateComponent::All) {
            let collection = self.orchestrator.config().qdrant.collection_name;
            let result = indexer.store().collection_exists(&collection).await;
            checks.insert(
                "qdrant".to_string(),
                match result {
                    Ok(exists) => serde_json::json!({"ok": true, "collection_exists": exists}),
                    Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
                },
            );
        }

        if matches!(params.component, ValidateComponent::Embedder | ValidateComponent::All) {
            let result = semindex_search::validate_dimension(indexer.embedder().as_ref());
            checks.insert(
                "embedder".to_string(),
                match result {
                    Ok(()) => serde_json::json!({
                        "ok": true,
                        "provider": indexer.embedder().provider_type(),
                        "dimension": indexer.embedder().embedding_dim(),
                    }),
                    Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
                },
            );
        }

        let all_ok = checks.values().all(|v| v["ok"].as_bool().unwrap_or(false));

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&serde_json::json!({
                "ok": all_ok,
                "checks": checks,
            }))
            .unwrap_or_default(),
        )]))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PrismServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "semindex: semantic code search and indexing for AI assistants.\n\n\
                TOOLS:\n\
                - codebase_search: find code by meaning, not just keyword match\n\
                - indexing_status: check progress, queue size, and accumulated stats\n\
                - reindex: force a full, incremental, or per-file reindex\n\
                - configure_indexer: switch embedding provider/Qdrant/concurrency at runtime\n\
                - clear_index: delete the active collection (requires confirm=true)\n\
                - validate_config: health-check Qdrant connectivity and the embedder\n\n\
                WORKFLOW: codebase_search first; reindex after editing files if results look stale."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
