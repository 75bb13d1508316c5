//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.semindex/config.toml`
//! 2. Local config: `.semindex/config.toml` (in workspace)
//! 3. CLI / tool-call overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, SemindexConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".semindex";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".semindex";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.semindex`).
    global_config_dir: Option<PathBuf>,

    /// Cached global config.
    global_config: Option<SemindexConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.semindex`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<SemindexConfig, ConfigError> {
        let mut config = SemindexConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<SemindexConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<SemindexConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &SemindexConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        let global_path = global_dir.join(CONFIG_FILE_NAME);
        save_config_file(&global_path, config)
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &SemindexConfig,
    ) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        save_config_file(&local_path, config)
    }

    /// Initialize global configuration directory.
    ///
    /// Creates `~/.semindex/config.toml` with default configuration.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir)
                .map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = SemindexConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Initialize local configuration for a workspace.
    ///
    /// Creates `.semindex/config.toml` with default configuration.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(LOCAL_CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir)
                .map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = SemindexConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<SemindexConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &SemindexConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: SemindexConfig, overlay: SemindexConfig) -> SemindexConfig {
    SemindexConfig {
        codebase: crate::CodebaseConfig {
            path: overlay.codebase.path.or(base.codebase.path),
        },
        embedding: merge_embedding(base.embedding, overlay.embedding),
        qdrant: merge_qdrant(base.qdrant, overlay.qdrant),
        indexing: merge_indexing(base.indexing, overlay.indexing),
        search: overlay.search,
        multi_workspace: overlay.multi_workspace,
        git: overlay.git,
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_embedding(
    base: crate::EmbeddingConfig,
    overlay: crate::EmbeddingConfig,
) -> crate::EmbeddingConfig {
    crate::EmbeddingConfig {
        provider: if overlay.provider != crate::EmbeddingProviderType::Local {
            overlay.provider
        } else {
            base.provider
        },
        api_key: overlay.api_key.or(base.api_key),
        base_url: overlay.base_url.or(base.base_url),
        model: overlay.model.or(base.model),
        dimensions: if overlay.dimensions != 768 {
            overlay.dimensions
        } else {
            base.dimensions
        },
        chunk_size: if overlay.chunk_size != 512 {
            overlay.chunk_size
        } else {
            base.chunk_size
        },
        chunk_overlap: if overlay.chunk_overlap != 50 {
            overlay.chunk_overlap
        } else {
            base.chunk_overlap
        },
    }
}

fn merge_qdrant(base: crate::QdrantConfig, overlay: crate::QdrantConfig) -> crate::QdrantConfig {
    crate::QdrantConfig {
        url: if overlay.url != "http://localhost:6334" {
            overlay.url
        } else {
            base.url
        },
        api_key: overlay.api_key.or(base.api_key),
        collection_name: if overlay.collection_name != "codebase-index" {
            overlay.collection_name
        } else {
            base.collection_name
        },
        distance_metric: overlay.distance_metric,
    }
}

fn merge_indexing(
    base: crate::IndexingConfig,
    overlay: crate::IndexingConfig,
) -> crate::IndexingConfig {
    crate::IndexingConfig {
        languages: if overlay.languages.is_empty() {
            base.languages
        } else {
            overlay.languages
        },
        exclude: {
            let mut patterns = base.exclude;
            for pattern in overlay.exclude {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
            patterns
        },
        include: {
            let mut patterns = base.include;
            for pattern in overlay.include {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
            patterns
        },
        batch_size: if overlay.batch_size != 50 {
            overlay.batch_size
        } else {
            base.batch_size
        },
        concurrency: if overlay.concurrency != 5 {
            overlay.concurrency
        } else {
            base.concurrency
        },
        max_file_size: if overlay.max_file_size != 1_048_576 {
            overlay.max_file_size
        } else {
            base.max_file_size
        },
        respect_gitignore: overlay.respect_gitignore,
        use_mcpignore: overlay.use_mcpignore,
        auto_index: overlay.auto_index,
        watch_files: overlay.watch_files,
        watch_branches: overlay.watch_branches,
        fallback_chunking: overlay.fallback_chunking,
        markdown_header_parsing: overlay.markdown_header_parsing,
        exclude_binaries: overlay.exclude_binaries,
        exclude_images: overlay.exclude_images,
        watch_debounce: if overlay.watch_debounce != 200 {
            overlay.watch_debounce
        } else {
            base.watch_debounce
        },
    }
}

fn merge_logging(
    base: crate::LoggingConfig,
    overlay: crate::LoggingConfig,
) -> crate::LoggingConfig {
    crate::LoggingConfig {
        level: if overlay.level != crate::LogLevel::Info {
            overlay.level
        } else {
            base.level
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config(content: &str, dir: &Path, filename: &str) -> PathBuf {
        let config_dir = dir.join(".semindex");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(filename);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.qdrant.url, "http://localhost:6334");
        assert_eq!(config.qdrant.collection_name, "codebase-index");
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_test_config(
            r#"
            [qdrant]
            url = "http://custom:6334"
            collection_name = "custom-index"
            "#,
            temp.path(),
            "config.toml",
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.qdrant.url, "http://custom:6334");
        assert_eq!(config.qdrant.collection_name, "custom-index");
    }

    #[test]
    fn test_global_overrides_default() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.logging.level, crate::LogLevel::Debug);
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"

            [qdrant]
            url = "http://global:6334"
            "#,
        )
        .unwrap();

        create_test_config(
            r#"
            [qdrant]
            url = "http://local:6334"
            "#,
            temp.path(),
            "config.toml",
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.qdrant.url, "http://local:6334");
        assert_eq!(config.logging.level, crate::LogLevel::Debug);
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();

        create_test_config(
            r#"
            [qdrant]
            url = "http://local:6334"
            "#,
            temp.path(),
            "config.toml",
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            qdrant_url: Some("http://cli:6334".to_string()),
            log_level: Some(crate::LogLevel::Error),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.qdrant.url, "http://cli:6334");
        assert_eq!(config.logging.level, crate::LogLevel::Error);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = SemindexConfig::default();
        config.qdrant.url = "http://saved:6334".to_string();
        config.logging.level = crate::LogLevel::Warn;

        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();

        assert_eq!(loaded.qdrant.url, "http://saved:6334");
        assert_eq!(loaded.logging.level, crate::LogLevel::Warn);
    }

    #[test]
    fn test_init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();

        assert!(config_path.exists());
        assert!(config_path.ends_with(".semindex/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: SemindexConfig = toml::from_str(&content).unwrap();
    }

    #[test]
    fn test_exclude_patterns_merge() {
        let base = crate::IndexingConfig {
            exclude: vec!["**/node_modules/**".to_string()],
            ..Default::default()
        };

        let overlay = crate::IndexingConfig {
            exclude: vec!["**/custom/**".to_string()],
            ..Default::default()
        };

        let merged = merge_indexing(base, overlay);

        assert!(merged.exclude.contains(&"**/node_modules/**".to_string()));
        assert!(merged.exclude.contains(&"**/custom/**".to_string()));
    }

    #[test]
    fn test_cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);

        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
