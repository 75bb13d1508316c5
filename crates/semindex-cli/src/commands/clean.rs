//! Clean command - remove indexed data for a workspace
//!
//! Provides cleanup for:
//! - The Qdrant collection holding this workspace's vectors
//! - The local `.semindex/` config directory

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use clap::Args;
use semindex_config::ConfigLoader;

use super::{create_orchestrator, resolve_workspace};
use crate::GlobalOptions;

/// Arguments for the clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Skip confirmation prompt
    #[arg(long, short = 'f')]
    force: bool,

    /// Show what would be deleted without actually deleting
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Only remove the local `.semindex/` directory, skip the Qdrant collection
    #[arg(long)]
    local_only: bool,

    /// Only clear the Qdrant collection, skip the local `.semindex/` directory
    #[arg(long)]
    backend_only: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Result of the clean operation
#[derive(Debug, Clone, serde::Serialize)]
pub struct CleanResult {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalCleanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionCleanResult>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LocalCleanResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectionCleanResult {
    pub collection_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Execute the clean command
pub async fn execute(args: CleanArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();
    let local_dir = loader.local_config_path(&workspace).parent().unwrap().to_path_buf();

    let clean_local = !args.backend_only;
    let clean_collection = !args.local_only;

    if !args.force && !args.dry_run {
        print_cleanup_preview(clean_local, clean_collection, &local_dir, &global);

        print!("\nProceed with cleanup? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({"cancelled": true}))?
                );
            } else {
                println!("Cleanup cancelled.");
            }
            return Ok(());
        }
    }

    let mut result = CleanResult { dry_run: args.dry_run, local: None, collection: None };

    if clean_collection {
        result.collection = Some(clean_collection_data(&global, args.dry_run).await);
    }

    if clean_local {
        result.local = Some(clean_local_data(&local_dir, args.dry_run));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_clean_result(&result, &global);
    }

    let has_errors = result.local.as_ref().map(|l| !l.success).unwrap_or(false)
        || result.collection.as_ref().map(|c| !c.success).unwrap_or(false);

    if has_errors {
        std::process::exit(1);
    }

    Ok(())
}

fn print_cleanup_preview(
    clean_local: bool,
    clean_collection: bool,
    local_dir: &Path,
    global: &GlobalOptions,
) {
    println!("semindex Clean Preview");
    println!("======================\n");

    if clean_collection {
        println!("Collection:");
        println!("  Qdrant URL: {}", global.qdrant_url.as_deref().unwrap_or("(from config)"));
        println!("  Action: the active collection will be dropped");
    }

    if clean_local {
        println!("\nLocal config:");
        println!("  Path: {}", local_dir.display());
        if local_dir.exists() {
            println!("  Action: will be deleted");
        } else {
            println!("  Status: does not exist (nothing to delete)");
        }
    }
}

async fn clean_collection_data(global: &GlobalOptions, dry_run: bool) -> CollectionCleanResult {
    let orchestrator = match create_orchestrator(global).await {
        Ok(o) => o,
        Err(e) => {
            return CollectionCleanResult {
                collection_name: String::new(),
                success: false,
                error: Some(format!("failed to connect: {e}")),
            };
        }
    };

    let collection_name = orchestrator.config().qdrant.collection_name.clone();
    let indexer = orchestrator.indexer();

    if dry_run {
        if !global.quiet {
            println!("Would clear collection: {collection_name}");
        }
        return CollectionCleanResult { collection_name, success: true, error: None };
    }

    match indexer.store().delete_collection(&collection_name).await {
        Ok(()) => {
            if !global.quiet {
                println!("Cleared collection: {collection_name}");
            }
            CollectionCleanResult { collection_name, success: true, error: None }
        }
        Err(e) => CollectionCleanResult {
            collection_name,
            success: false,
            error: Some(e.to_string()),
        },
    }
}

fn clean_local_data(local_dir: &Path, dry_run: bool) -> LocalCleanResult {
    if !local_dir.exists() {
        return LocalCleanResult {
            path: local_dir.display().to_string(),
            success: true,
            error: Some("directory does not exist".to_string()),
        };
    }

    if dry_run {
        return LocalCleanResult {
            path: local_dir.display().to_string(),
            success: true,
            error: None,
        };
    }

    match std::fs::remove_dir_all(local_dir) {
        Ok(()) => LocalCleanResult {
            path: local_dir.display().to_string(),
            success: true,
            error: None,
        },
        Err(e) => LocalCleanResult {
            path: local_dir.display().to_string(),
            success: false,
            error: Some(e.to_string()),
        },
    }
}

fn print_clean_result(result: &CleanResult, global: &GlobalOptions) {
    if global.quiet {
        return;
    }

    if result.dry_run {
        println!("\nDry run complete - no changes made.");
        return;
    }

    println!("\nClean Summary");
    println!("=============");

    if let Some(ref collection) = result.collection {
        if collection.success {
            println!("Collection: cleared ({})", collection.collection_name);
        } else if let Some(ref err) = collection.error {
            println!("Collection: failed - {err}");
        }
    }

    if let Some(ref local) = result.local {
        if local.success {
            if local.error.is_some() {
                println!("Local:      already clean");
            } else {
                println!("Local:      cleaned ({})", local.path);
            }
        } else if let Some(ref err) = local.error {
            println!("Local:      failed - {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_local_data_missing_dir() {
        let result = clean_local_data(Path::new("/nonexistent/path/.semindex"), false);
        assert!(result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_clean_local_data_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let local_dir = dir.path().join(".semindex");
        std::fs::create_dir_all(&local_dir).unwrap();

        let result = clean_local_data(&local_dir, true);
        assert!(result.success);
        assert!(local_dir.exists());
    }

    #[test]
    fn test_clean_local_data_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let local_dir = dir.path().join(".semindex");
        std::fs::create_dir_all(&local_dir).unwrap();

        let result = clean_local_data(&local_dir, false);
        assert!(result.success);
        assert!(!local_dir.exists());
    }

    #[test]
    fn test_clean_result_serialization_skips_none() {
        let result = CleanResult { dry_run: true, local: None, collection: None };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"dry_run\":true"));
        assert!(!json.contains("\"local\""));
        assert!(!json.contains("\"collection\""));
    }
}
