//! Error types for the MCP server.

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Errors that can occur in the MCP server, orchestrator, and status manager.
#[derive(Error, Debug)]
pub enum McpError {
    /// Search or indexing pipeline failure (embedding, vector store, parsing).
    #[error("search failed: {0}")]
    Search(#[from] semindex_search::SearchError),

    /// Configuration load/validation failure.
    #[error("configuration error: {0}")]
    Config(#[from] semindex_config::ConfigError),

    /// A tool or orchestrator call was made before `initialize()` completed.
    #[error("indexer is not running: {0}")]
    NotRunning(String),

    /// `index_all` was called while a previous run was still in progress.
    #[error("an indexing run is already in progress")]
    AlreadyRunning,

    /// Invalid tool-call parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A `reconfigure` health check rejected the candidate configuration.
    #[error("configuration rejected: {0}")]
    ReconfigureRejected(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}
