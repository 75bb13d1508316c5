//! semindex configuration management.
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.semindex/config.toml`
//! - Local config: `.semindex/config.toml` (in workspace)
//! - CLI / tool-call overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for semindex.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SemindexConfig {
    /// Codebase root configuration.
    pub codebase: CodebaseConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Qdrant vector store configuration.
    pub qdrant: QdrantConfig,

    /// Indexing behavior configuration.
    pub indexing: IndexingConfig,

    /// Search defaults and caching configuration.
    pub search: SearchConfig,

    /// Multi-workspace configuration.
    pub multi_workspace: MultiWorkspaceConfig,

    /// Git integration configuration.
    pub git: GitConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Codebase root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodebaseConfig {
    /// Root path of the codebase to index. `None` means "the current workspace root",
    /// resolved by the caller at load time.
    pub path: Option<PathBuf>,
}

impl Default for CodebaseConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

/// Embedding provider configuration.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "local"
/// dimensions = 768
/// chunk_size = 512
/// chunk_overlap = 50
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding provider to use.
    pub provider: EmbeddingProviderType,

    /// API key for remote providers (azure-ml, openai). Can also come from an env var;
    /// see the provider-specific settings below.
    pub api_key: Option<String>,

    /// Base URL override for remote providers.
    pub base_url: Option<String>,

    /// Model name override for remote providers.
    pub model: Option<String>,

    /// Embedding vector dimensionality. Must match the provider's actual output size.
    pub dimensions: u32,

    /// Number of lines per chunk when the line-based fallback chunker is used.
    pub chunk_size: usize,

    /// Overlap, in lines, between consecutive fallback chunks.
    pub chunk_overlap: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            api_key: None,
            base_url: None,
            model: None,
            dimensions: 768,
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl EmbeddingConfig {
    /// Validate that required settings exist for the selected provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderType::Local => Ok(()),
            EmbeddingProviderType::AzureMl => {
                if self.base_url.is_none() {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'azure-ml' but embedding.base_url is missing"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            EmbeddingProviderType::Openai => {
                if self.model.is_none() {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'openai' but embedding.model is missing"
                            .to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Embedding provider type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Local provider using Candle with Jina models (default).
    #[default]
    Local,
    /// Azure ML Online Endpoints.
    AzureMl,
    /// OpenAI-compatible API (OpenAI, Azure OpenAI, Ollama, etc.).
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::AzureMl => write!(f, "azure-ml"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "azure-ml" | "azureml" | "azure_ml" => Ok(Self::AzureMl),
            "openai" => Ok(Self::Openai),
            _ => Err(ConfigError::ValidationError(format!(
                "unknown embedding provider: '{}'. Valid values: local, azure-ml, openai",
                s
            ))),
        }
    }
}

/// Qdrant vector database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Qdrant server URL.
    pub url: String,

    /// API key for authentication (optional).
    pub api_key: Option<String>,

    /// Collection name.
    pub collection_name: String,

    /// Distance metric used for the collection.
    pub distance_metric: DistanceMetric,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_name: "codebase-index".to_string(),
            distance_metric: DistanceMetric::default(),
        }
    }
}

/// Vector distance metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// Cosine similarity (default; matches the Jina embedding models).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean distance.
    Euclidean,
}

/// Indexing behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Languages to index. Empty means "all supported languages".
    pub languages: Vec<String>,

    /// Additional glob patterns to exclude.
    pub exclude: Vec<String>,

    /// Additional glob patterns to include even if otherwise excluded.
    pub include: Vec<String>,

    /// Number of blocks per embedding/upsert batch.
    pub batch_size: usize,

    /// Number of files processed concurrently.
    pub concurrency: usize,

    /// Maximum file size, in bytes, considered for indexing.
    pub max_file_size: u64,

    /// Respect `.gitignore` files during discovery.
    pub respect_gitignore: bool,

    /// Respect `.mcpignore` files during discovery.
    pub use_mcpignore: bool,

    /// Automatically index on startup / file changes.
    pub auto_index: bool,

    /// Watch the filesystem for changes and reindex incrementally.
    pub watch_files: bool,

    /// Watch the current git branch and reindex on switch.
    pub watch_branches: bool,

    /// Fall back to fixed-size line chunking for unsupported languages.
    pub fallback_chunking: bool,

    /// Parse markdown header sections as blocks.
    pub markdown_header_parsing: bool,

    /// Exclude binary files from discovery.
    pub exclude_binaries: bool,

    /// Exclude image files from discovery.
    pub exclude_images: bool,

    /// Debounce window, in milliseconds, for the file watcher.
    pub watch_debounce: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            exclude: Vec::new(),
            include: Vec::new(),
            batch_size: 50,
            concurrency: 5,
            max_file_size: 1_048_576,
            respect_gitignore: true,
            use_mcpignore: true,
            auto_index: true,
            watch_files: true,
            watch_branches: true,
            fallback_chunking: true,
            markdown_header_parsing: true,
            exclude_binaries: true,
            exclude_images: true,
            watch_debounce: 200,
        }
    }
}

/// Search defaults and caching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result limit.
    pub default_limit: u64,

    /// Default minimum similarity score.
    pub min_score: f32,

    /// Include surrounding lines of context in results by default.
    pub include_context: bool,

    /// Number of context lines to include on each side.
    pub context_lines: usize,

    /// Search mode across multi-workspace setups.
    pub search_mode: SearchMode,

    /// Maintain one Qdrant collection per folder in multi-workspace mode.
    pub per_folder_collections: bool,

    /// Enable the in-memory query result cache.
    pub enable_cache: bool,

    /// Maximum number of cached queries.
    pub cache_size: usize,

    /// Cache entry time-to-live, in milliseconds.
    pub cache_ttl: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            min_score: 0.7,
            include_context: true,
            context_lines: 5,
            search_mode: SearchMode::default(),
            per_folder_collections: true,
            enable_cache: true,
            cache_size: 100,
            cache_ttl: 300_000,
        }
    }
}

/// Search mode across multiple workspace folders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Search across all configured folders at once.
    #[default]
    AllFolders,
    /// Search one folder at a time.
    PerFolder,
}

/// Multi-workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiWorkspaceConfig {
    /// Enable multi-workspace support.
    pub enabled: bool,

    /// Index each workspace independently (separate collections/state).
    pub independent_indexing: bool,

    /// Aggregate status reporting across workspaces.
    pub aggregate_status: bool,
}

impl Default for MultiWorkspaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            independent_indexing: true,
            aggregate_status: true,
        }
    }
}

/// Git integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Poll the current branch and react to switches.
    pub watch_branches: bool,

    /// Auto-detect uncommitted changes for incremental reindexing.
    pub auto_detect_changes: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            watch_branches: true,
            auto_detect_changes: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::ValidationError(format!(
                "unknown log level: '{}'. Valid values: debug, info, warn, error",
                s
            ))),
        }
    }
}

/// CLI / tool-call overrides for configuration values.
///
/// Used to apply command-line arguments or `configure_indexer` tool-call
/// parameters over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the codebase root path.
    pub codebase_path: Option<PathBuf>,

    /// Override the Qdrant URL.
    pub qdrant_url: Option<String>,

    /// Override the Qdrant collection name.
    pub qdrant_collection_name: Option<String>,

    /// Override the embedding provider type.
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Override the log level.
    pub log_level: Option<LogLevel>,

    /// Override indexing concurrency.
    pub concurrency: Option<usize>,
}

impl SemindexConfig {
    /// Apply overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.codebase_path {
            self.codebase.path = Some(path.clone());
        }

        if let Some(ref url) = overrides.qdrant_url {
            self.qdrant.url = url.clone();
        }

        if let Some(ref name) = overrides.qdrant_collection_name {
            self.qdrant.collection_name = name.clone();
        }

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }

        if let Some(concurrency) = overrides.concurrency {
            self.indexing.concurrency = concurrency;
        }
    }

    /// Validate the configuration.
    ///
    /// Checks that all required settings exist for the selected providers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        if self.indexing.concurrency == 0 {
            return Err(ConfigError::invalid_value(
                "indexing.concurrency",
                "must be at least 1",
            ));
        }
        if self.indexing.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                "indexing.batch_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Resolve the codebase root against a workspace directory, falling back
    /// to the workspace root itself when no explicit path is configured.
    pub fn codebase_root(&self, workspace_root: &std::path::Path) -> PathBuf {
        match &self.codebase.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace_root.join(path),
            None => workspace_root.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SemindexConfig::default();
        assert_eq!(config.qdrant.url, "http://localhost:6334");
        assert_eq!(config.qdrant.collection_name, "codebase-index");
        assert_eq!(config.embedding.dimensions, 768);
        assert!(config.indexing.respect_gitignore);
        assert!(config.indexing.watch_files);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = SemindexConfig::default();
        let overrides = ConfigOverrides {
            qdrant_url: Some("http://remote:6334".to_string()),
            log_level: Some(LogLevel::Debug),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.qdrant.url, "http://remote:6334");
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_codebase_root_resolution() {
        let config = SemindexConfig::default();
        let workspace = PathBuf::from("/home/user/project");
        assert_eq!(config.codebase_root(&workspace), workspace);
    }

    #[test]
    fn test_codebase_root_relative_override() {
        let mut config = SemindexConfig::default();
        config.codebase.path = Some(PathBuf::from("subdir"));
        let workspace = PathBuf::from("/home/user/project");
        assert_eq!(
            config.codebase_root(&workspace),
            PathBuf::from("/home/user/project/subdir")
        );
    }

    #[test]
    fn test_embedding_provider_type_display() {
        assert_eq!(EmbeddingProviderType::Local.to_string(), "local");
        assert_eq!(EmbeddingProviderType::AzureMl.to_string(), "azure-ml");
        assert_eq!(EmbeddingProviderType::Openai.to_string(), "openai");
    }

    #[test]
    fn test_embedding_provider_type_from_str() {
        assert_eq!(
            "local".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Local
        );
        assert_eq!(
            "azureml".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::AzureMl
        );
        assert!("unknown".parse::<EmbeddingProviderType>().is_err());
    }

    #[test]
    fn test_embedding_config_validate_local() {
        assert!(EmbeddingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_embedding_config_validate_azure_ml_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::AzureMl,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_embedding_config_validate_openai_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = SemindexConfig::default();
        config.indexing.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SemindexConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SemindexConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.qdrant.url, config.qdrant.url);
        assert_eq!(parsed.embedding.dimensions, config.embedding.dimensions);
    }
}
