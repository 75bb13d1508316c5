//! MCP tool parameter definitions.
//!
//! These structs define the JSON Schema for tool parameters using schemars,
//! via the `rmcp::schemars` re-export (no separate `schemars` dependency).

use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Parameters for the `codebase_search` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodebaseSearchParams {
    /// Natural-language or code query to embed and search with.
    #[schemars(description = "Search query (natural language or code snippet)")]
    pub query: String,

    /// Maximum number of results to return.
    #[schemars(description = "Maximum results to return (default 10)")]
    pub limit: Option<usize>,

    /// Minimum similarity score, below which a hit is dropped.
    #[schemars(description = "Minimum similarity score 0.0-1.0 (default 0.7)")]
    pub threshold: Option<f32>,

    /// Restrict results to these file extensions (e.g. `["rs", "py"]`).
    #[schemars(description = "Restrict to these file extensions")]
    pub file_types: Option<Vec<String>>,

    /// Restrict results to these repo-relative paths or path prefixes.
    #[schemars(description = "Restrict to these paths or path prefixes")]
    pub paths: Option<Vec<String>>,

    /// Restrict results to a single directory prefix.
    #[schemars(description = "Restrict results to files under this directory")]
    pub directory_prefix: Option<String>,

    /// Restrict results to these source languages.
    #[schemars(description = "Restrict to these languages (e.g. [\"rust\", \"python\"])")]
    pub languages: Option<Vec<String>>,

    /// Include surrounding source lines for each hit.
    #[schemars(description = "Include surrounding source lines for each hit (default true)")]
    pub include_context: Option<bool>,

    /// Number of lines of context before/after each hit.
    #[schemars(description = "Lines of context before/after each hit (default 3)")]
    pub context_lines: Option<usize>,
}

/// Parameters for the `indexing_status` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IndexingStatusParams {
    /// Include the full error ring and per-language/file-type breakdowns.
    #[schemars(description = "Include error ring and per-language/file-type breakdowns")]
    #[serde(default)]
    pub detailed: bool,
}

/// Which files a `reindex` call should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReindexMode {
    Full,
    Incremental,
    File,
}

impl Default for ReindexMode {
    fn default() -> Self {
        Self::Incremental
    }
}

/// Parameters for the `reindex` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReindexParams {
    /// Which files to reindex.
    #[schemars(description = "\"full\", \"incremental\", or \"file\" (default incremental)")]
    #[serde(default)]
    pub mode: ReindexMode,

    /// Specific paths to reindex, required when `mode` is `file`.
    #[schemars(description = "Paths to reindex (required when mode is \"file\")")]
    pub paths: Option<Vec<String>>,

    /// Bypass the hash-cache unchanged-file filter.
    #[schemars(description = "Bypass the unchanged-file filter and reindex everything touched")]
    #[serde(default)]
    pub force: bool,
}

/// Parameters for the `configure_indexer` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConfigureIndexerParams {
    /// New embedding provider (`local`, `azure-ml`, `openai`).
    #[schemars(description = "Embedding provider: \"local\", \"azure-ml\", or \"openai\"")]
    pub provider: Option<String>,

    /// Provider-specific settings (base URL, API key, model).
    #[schemars(description = "Provider-specific settings: base_url, api_key, model")]
    pub provider_config: Option<ProviderConfigParams>,

    /// Qdrant connection settings.
    #[schemars(description = "Qdrant connection settings: url, collection_name")]
    pub qdrant_config: Option<QdrantConfigParams>,

    /// Indexing behavior settings.
    #[schemars(description = "Indexing settings: concurrency, batch_size")]
    pub indexing_config: Option<IndexingConfigParams>,

    /// Validate the candidate configuration before applying it (default true).
    #[schemars(description = "Health-check the candidate configuration before applying it")]
    #[serde(default = "default_true")]
    pub validate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfigParams {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QdrantConfigParams {
    pub url: Option<String>,
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexingConfigParams {
    pub concurrency: Option<usize>,
}

/// Parameters for the `clear_index` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearIndexParams {
    /// Must be `true`; a bare call without explicit confirmation is rejected.
    #[schemars(description = "Must be set to true to confirm a destructive clear")]
    pub confirm: bool,

    /// Workspace to clear, for multi-workspace setups (defaults to the active one).
    #[schemars(description = "Workspace to clear (defaults to the active workspace)")]
    pub workspace: Option<String>,
}

/// Which component(s) `validate_config` should check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidateComponent {
    Qdrant,
    Embedder,
    All,
}

impl Default for ValidateComponent {
    fn default() -> Self {
        Self::All
    }
}

/// Parameters for the `validate_config` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidateConfigParams {
    /// Which component to validate.
    #[schemars(description = "\"qdrant\", \"embedder\", or \"all\" (default all)")]
    #[serde(default)]
    pub component: ValidateComponent,
}
