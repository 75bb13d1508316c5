//! Init command - initialize a workspace and run an initial index

use anyhow::{Context, Result};
use clap::Args;
use semindex_config::ConfigLoader;

use super::{load_config, print_info, resolve_workspace};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Reinitialize even if `.semindex/config.toml` already exists
    #[arg(long, short = 'f')]
    force: bool,

    /// Skip the initial index after writing the local config
    #[arg(long)]
    no_index: bool,
}

/// Execute the init command
pub async fn execute(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();
    let config_path = loader.local_config_path(&workspace);

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Workspace already initialized: {}\n  Use --force to reinitialize.",
            config_path.display()
        );
    }

    let pb = spinner("Writing local configuration...", global.quiet);
    let written_path = loader
        .init_local(&workspace)
        .context("Failed to write local configuration")?;
    finish_spinner(pb, &format!("Wrote {}", written_path.display()));

    if args.no_index {
        print_info(
            "\nNext steps:\n  semindex index      run an initial index\n  semindex search ... search once indexed",
            global.quiet,
        );
        return Ok(());
    }

    let pb = spinner("Indexing workspace...", global.quiet);
    let mut config = load_config(&global, &workspace)?;
    config.indexing.auto_index = false;

    match semindex_mcp::Orchestrator::new(workspace.clone(), config).await {
        Ok(orchestrator) => {
            let indexer = orchestrator.indexer();
            match indexer
                .index_all(semindex_mcp::IndexOptions::default())
                .await
            {
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
                    finish_spinner_warn(pb, &format!("Initial index failed: {e}"));
                }
            }
        }
        Err(e) => {
            finish_spinner_warn(pb, &format!("Could not start indexer: {e}"));
        }
    }

    print_info(
        "\nRun 'semindex search <query>' to search the indexed codebase.",
        global.quiet,
    );
    Ok(())
}
