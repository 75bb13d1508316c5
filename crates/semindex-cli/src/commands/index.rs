//! Index command - full or incremental reindex of the workspace

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, resolve_workspace};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Force a full reindex, bypassing the hash-cache unchanged-file filter
    #[arg(long, short = 'f')]
    force: bool,

    /// Reindex only these paths instead of the whole workspace
    #[arg(long)]
    paths: Vec<String>,
}

/// Execute the index command
pub async fn execute(args: IndexArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let mut config = load_config(&global, &workspace)?;
    config.indexing.auto_index = false;

    let msg = if args.force {
        "Reindexing workspace (forced)..."
    } else {
        "Reindexing workspace..."
    };
    let pb = spinner(msg, global.quiet);

    let orchestrator = semindex_mcp::Orchestrator::new(workspace, config)
        .await
        .context("Failed to initialize indexer")?;
    let indexer = orchestrator.indexer();

    if args.paths.is_empty() {
        let options = semindex_mcp::IndexOptions { force: args.force };
        match indexer.index_all(options).await {
            Ok(()) => {
                let state = indexer.get_state();
                finish_spinner(
                    pb,
                    &format!(
                        "Indexed {} file(s), {} block(s)",
                        state.stats.total_files, state.stats.total_blocks
                    ),
                );
            }
            Err(e) => {
                finish_spinner_warn(pb, &format!("Reindex failed: {e}"));
                return Err(e.into());
            }
        }
    } else {
        for path in &args.paths {
            let event = semindex_search::WatchEvent {
                path: indexer.root().join(path),
                kind: semindex_search::WatchEventKind::Modified,
            };
            if let Err(e) = indexer.handle_change(event).await {
                finish_spinner_warn(pb, &format!("Failed to reindex {path}: {e}"));
                return Err(e.into());
            }
        }
        finish_spinner(pb, &format!("Reindexed {} path(s)", args.paths.len()));
    }

    Ok(())
}
