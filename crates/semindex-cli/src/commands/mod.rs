//! CLI command implementations
//!
//! This module contains all semindex CLI command implementations.

pub mod clean;
pub mod config;
pub mod index;
pub mod init;
pub mod mcp;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use semindex_config::{ConfigLoader, SemindexConfig};
use semindex_mcp::Orchestrator;

use crate::GlobalOptions;

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    let path = match &global.workspace {
        Some(ws) => PathBuf::from(ws),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if !path.exists() {
        anyhow::bail!("Workspace path does not exist: {}", path.display());
    }

    path.canonicalize()
        .with_context(|| format!("Failed to resolve workspace path: {}", path.display()))
}

/// Load configuration with optional config file override and CLI overrides applied.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<SemindexConfig> {
    let mut loader = ConfigLoader::new();

    let mut config = if let Some(ref config_path) = global.config {
        let parent = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(workspace);
        loader
            .load_local(parent)
            .context("Failed to load config file")?
            .ok_or_else(|| anyhow::anyhow!("Config file not found: {}", config_path.display()))?
    } else {
        loader
            .load(workspace, None)
            .context("Failed to load configuration")?
    };

    config.apply_overrides(&global.to_config_overrides());
    config
        .validate()
        .context("Invalid configuration")?;

    Ok(config)
}

/// Build the orchestrator (indexer + embedder + Qdrant connection) for the
/// resolved workspace. This is the same collaborator the MCP server drives,
/// run one-shot from the CLI.
pub async fn create_orchestrator(global: &GlobalOptions) -> Result<Arc<Orchestrator>> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace)?;

    let orchestrator = Orchestrator::new(workspace, config)
        .await
        .context("Failed to initialize indexer")?;

    Ok(Arc::new(orchestrator))
}

/// Print a result in a consistent format.
#[allow(dead_code)]
pub fn print_result<T: std::fmt::Display>(result: T, quiet: bool) {
    if !quiet {
        println!("{}", result);
    }
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    eprintln!("error: {}", message);
}

/// Print a warning message to stderr.
#[allow(dead_code)]
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
