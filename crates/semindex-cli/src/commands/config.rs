//! Config command - view and manage configuration
//!
//! - List all configuration values with their sources (default/global/local)
//! - Get a specific configuration value
//! - Set a configuration value (local or global)
//! - Show configuration file paths

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use semindex_config::{ConfigLoader, SemindexConfig};
use serde::Serialize;

use super::resolve_workspace;
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// List all configuration values with their sources
    List(ListArgs),

    /// Get a specific configuration value
    Get(GetArgs),

    /// Set a configuration value
    Set(SetArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the list command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Show only effective values (hide sources)
    #[arg(long)]
    effective: bool,
}

/// Arguments for the get command
#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Configuration key (e.g., "qdrant.url")
    key: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the set command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (e.g., "qdrant.url")
    key: String,

    /// Value to set
    value: String,

    /// Set in global config (~/.semindex/config.toml) instead of local
    #[arg(long)]
    global: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration value with source information
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: serde_json::Value,
    pub source: String,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub local: PathBuf,
    pub global_exists: bool,
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::List(args) => execute_list(args, global).await,
        ConfigCommand::Get(args) => execute_get(args, global).await,
        ConfigCommand::Set(args) => execute_set(args, global).await,
        ConfigCommand::Path(args) => execute_path(args, global).await,
    }
}

async fn execute_list(args: ListArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let mut loader = ConfigLoader::new();

    let default_config = SemindexConfig::default();
    let global_config = loader.load_global()?.unwrap_or_default();
    let local_config = loader.load_local(&workspace)?.unwrap_or_default();
    let effective = loader.load(&workspace, None)?;

    if args.json {
        if args.effective {
            println!("{}", serde_json::to_string_pretty(&effective)?);
        } else {
            let values = collect_config_values(&default_config, &global_config, &local_config);
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
    } else {
        print_config_list(&default_config, &global_config, &local_config, &loader, &workspace);
    }

    Ok(())
}

async fn execute_get(args: GetArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let mut loader = ConfigLoader::new();
    let config = loader.load(&workspace, None)?;

    let value = get_config_value(&config, &args.key)
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", args.key))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{s}"),
            serde_json::Value::Bool(b) => println!("{b}"),
            serde_json::Value::Number(n) => println!("{n}"),
            serde_json::Value::Null => println!("null"),
            other => println!("{}", serde_json::to_string_pretty(&other)?),
        }
    }

    Ok(())
}

async fn execute_set(args: SetArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let mut loader = ConfigLoader::new();

    let mut config = if args.global {
        loader.load_global()?.unwrap_or_default()
    } else {
        loader.load_local(&workspace)?.unwrap_or_default()
    };

    set_config_value(&mut config, &args.key, &args.value)
        .context(format!("Failed to set configuration key: {}", args.key))?;

    if args.global {
        loader.save_global(&config)?;
        println!("Set {} = {} in global config", args.key, args.value);
    } else {
        loader.save_local(&workspace, &config)?;
        println!("Set {} = {} in local config", args.key, args.value);
    }

    Ok(())
}

async fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);

    let paths = ConfigPaths {
        global: global_path.clone(),
        local: local_path.clone(),
        global_exists: global_path.as_ref().map(|p| p.exists()).unwrap_or(false),
        local_exists: local_path.exists(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        println!("Configuration Paths");
        println!("===================\n");

        if let Some(ref gp) = paths.global {
            let status = if paths.global_exists { "exists" } else { "not found" };
            println!("Global: {} ({})", gp.display(), status);
        } else {
            println!("Global: not available (no home directory)");
        }

        let status = if paths.local_exists { "exists" } else { "not found" };
        println!("Local:  {} ({})", paths.local.display(), status);
    }

    Ok(())
}

/// Get a configuration value by dotted key path
fn get_config_value(config: &SemindexConfig, key: &str) -> Option<serde_json::Value> {
    let json = serde_json::to_value(config).ok()?;
    let parts: Vec<&str> = key.split('.').collect();

    let mut current = &json;
    for part in parts {
        current = current.get(part)?;
    }

    Some(current.clone())
}

/// Set a configuration value by dotted key path
fn set_config_value(config: &mut SemindexConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "qdrant.url" => config.qdrant.url = value.to_string(),
        "qdrant.api_key" => config.qdrant.api_key = Some(value.to_string()),
        "qdrant.collection_name" => config.qdrant.collection_name = value.to_string(),
        "embedding.provider" => config.embedding.provider = value.parse()?,
        "embedding.model" => config.embedding.model = Some(value.to_string()),
        "embedding.base_url" => config.embedding.base_url = Some(value.to_string()),
        "indexing.batch_size" => config.indexing.batch_size = value.parse()?,
        "indexing.concurrency" => config.indexing.concurrency = value.parse()?,
        "indexing.max_file_size" => config.indexing.max_file_size = value.parse()?,
        "indexing.auto_index" => config.indexing.auto_index = value.parse()?,
        "indexing.watch_files" => config.indexing.watch_files = value.parse()?,
        "indexing.watch_branches" => config.indexing.watch_branches = value.parse()?,
        "search.default_limit" => config.search.default_limit = value.parse()?,
        "search.min_score" => config.search.min_score = value.parse()?,
        "logging.level" => config.logging.level = value.parse()?,
        _ => anyhow::bail!("Unknown or read-only configuration key: {}", key),
    }

    Ok(())
}

/// Collect configuration values with source information
fn collect_config_values(
    default: &SemindexConfig,
    global: &SemindexConfig,
    local: &SemindexConfig,
) -> Vec<ConfigValue> {
    let mut values = Vec::new();

    let default_json = serde_json::to_value(default).unwrap();
    let global_json = serde_json::to_value(global).unwrap();
    let local_json = serde_json::to_value(local).unwrap();

    flatten_config("", &local_json, &global_json, &default_json, &mut values);

    values
}

/// Recursively flatten config into key-value pairs with sources
fn flatten_config(
    prefix: &str,
    local: &serde_json::Value,
    global: &serde_json::Value,
    default: &serde_json::Value,
    values: &mut Vec<ConfigValue>,
) {
    match local {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                let global_val = global.get(key).unwrap_or(&serde_json::Value::Null);
                let default_val = default.get(key).unwrap_or(&serde_json::Value::Null);

                flatten_config(&new_prefix, value, global_val, default_val, values);
            }
        }
        _ => {
            let source = if local != default && local != global {
                "local"
            } else if global != default {
                "global"
            } else {
                "default"
            };

            values.push(ConfigValue {
                key: prefix.to_string(),
                value: local.clone(),
                source: source.to_string(),
            });
        }
    }
}

/// Print configuration in a human-readable format
fn print_config_list(
    default: &SemindexConfig,
    global: &SemindexConfig,
    local: &SemindexConfig,
    loader: &ConfigLoader,
    workspace: &std::path::Path,
) {
    println!("semindex Configuration");
    println!("=======================\n");

    if let Some(gp) = loader.global_config_path() {
        let status = if gp.exists() { "" } else { " (not found)" };
        println!("Global config: {}{}", gp.display(), status);
    }
    let lp = loader.local_config_path(workspace);
    let status = if lp.exists() { "" } else { " (not found)" };
    println!("Local config:  {}{}\n", lp.display(), status);

    println!("[qdrant]");
    print_value("url", &local.qdrant.url, &global.qdrant.url, &default.qdrant.url);
    print_value(
        "collection_name",
        &local.qdrant.collection_name,
        &global.qdrant.collection_name,
        &default.qdrant.collection_name,
    );

    println!("\n[embedding]");
    print_value(
        "provider",
        &local.embedding.provider.to_string(),
        &global.embedding.provider.to_string(),
        &default.embedding.provider.to_string(),
    );

    println!("\n[indexing]");
    print_value(
        "batch_size",
        &local.indexing.batch_size,
        &global.indexing.batch_size,
        &default.indexing.batch_size,
    );
    print_value(
        "concurrency",
        &local.indexing.concurrency,
        &global.indexing.concurrency,
        &default.indexing.concurrency,
    );
    print_value(
        "auto_index",
        &local.indexing.auto_index,
        &global.indexing.auto_index,
        &default.indexing.auto_index,
    );

    println!("\n[search]");
    print_value(
        "default_limit",
        &local.search.default_limit,
        &global.search.default_limit,
        &default.search.default_limit,
    );
    print_value(
        "min_score",
        &local.search.min_score,
        &global.search.min_score,
        &default.search.min_score,
    );

    println!("\n[logging]");
    print_value(
        "level",
        &format!("{:?}", local.logging.level),
        &format!("{:?}", global.logging.level),
        &format!("{:?}", default.logging.level),
    );
}

/// Print a configuration value with its source
fn print_value<T: std::fmt::Display + PartialEq>(key: &str, local: &T, global: &T, default: &T) {
    let source = if local != default && local != global {
        " (local)"
    } else if global != default {
        " (global)"
    } else {
        ""
    };

    println!("  {key} = {local}{source}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_value() {
        let config = SemindexConfig::default();

        let url = get_config_value(&config, "qdrant.url");
        assert!(url.is_some());
        assert_eq!(url.unwrap(), "http://localhost:6334");

        let invalid = get_config_value(&config, "nonexistent.key");
        assert!(invalid.is_none());
    }

    #[test]
    fn test_set_config_value() {
        let mut config = SemindexConfig::default();

        set_config_value(&mut config, "qdrant.url", "http://custom:6334").unwrap();
        assert_eq!(config.qdrant.url, "http://custom:6334");

        set_config_value(&mut config, "indexing.concurrency", "8").unwrap();
        assert_eq!(config.indexing.concurrency, 8);
    }

    #[test]
    fn test_set_config_value_invalid() {
        let mut config = SemindexConfig::default();

        let result = set_config_value(&mut config, "indexing.concurrency", "not-a-number");
        assert!(result.is_err());

        let result = set_config_value(&mut config, "unknown.key", "value");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_paths_serialization() {
        let paths = ConfigPaths {
            global: Some(PathBuf::from("/home/user/.semindex/config.toml")),
            local: PathBuf::from("/project/.semindex/config.toml"),
            global_exists: true,
            local_exists: false,
        };

        let json = serde_json::to_string(&paths).unwrap();
        assert!(json.contains("\"global_exists\":true"));
        assert!(json.contains("\"local_exists\":false"));
    }

    #[test]
    fn test_config_value_serialization() {
        let value = ConfigValue {
            key: "qdrant.url".to_string(),
            value: serde_json::json!("http://localhost:6334"),
            source: "default".to_string(),
        };

        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"key\":\"qdrant.url\""));
        assert!(json.contains("\"source\":\"default\""));
    }
}
