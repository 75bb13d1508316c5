//! Status command - show indexing status and progress

use anyhow::Result;
use clap::Args;

use super::create_orchestrator;
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show configuration details
    #[arg(long = "show-config")]
    show_config: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let orchestrator = create_orchestrator(&global).await?;
    let indexer = orchestrator.indexer();
    let state = indexer.get_state();
    let config = orchestrator.config();

    if args.json {
        let mut status = serde_json::json!({
            "workspace": orchestrator.workspace_root(),
            "status": format!("{:?}", state.progress.status).to_lowercase(),
            "is_running": state.is_running,
            "is_watching": state.is_watching,
            "current_branch": state.current_branch,
            "queue_size": state.queue_size,
            "progress": {
                "files_processed": state.progress.files_processed,
                "files_total": state.progress.files_total,
                "percentage": state.progress.percentage(),
            },
            "stats": {
                "total_files": state.stats.total_files,
                "total_blocks": state.stats.total_blocks,
                "total_vectors": state.stats.total_vectors,
                "last_indexed": state.stats.last_indexed,
            },
        });

        if args.show_config {
            status["config"] = serde_json::json!({
                "qdrant_url": config.qdrant.url,
                "collection_name": config.qdrant.collection_name,
                "embedding_provider": config.embedding.provider.to_string(),
                "concurrency": config.indexing.concurrency,
            });
        }

        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("semindex Workspace Status");
    println!("=========================\n");
    println!("Workspace: {}", orchestrator.workspace_root().display());
    println!("Status:    {:?}", state.progress.status);
    println!("Running:   {}", state.is_running);
    println!("Watching:  {}", state.is_watching);
    if let Some(ref branch) = state.current_branch {
        println!("Branch:    {branch}");
    }
    println!("Queue:     {} pending", state.queue_size);

    println!("\nProgress:");
    println!(
        "  Files:  {}/{} ({:.1}%)",
        state.progress.files_processed,
        state.progress.files_total,
        state.progress.percentage()
    );

    println!("\nIndex:");
    println!("  Files:   {}", state.stats.total_files);
    println!("  Blocks:  {}", state.stats.total_blocks);
    println!("  Vectors: {}", state.stats.total_vectors);
    if let Some(ref last) = state.stats.last_indexed {
        println!("  Last indexed: {last}");
    }

    if args.show_config {
        println!("\nConfiguration:");
        println!("  Qdrant URL:  {}", config.qdrant.url);
        println!("  Collection:  {}", config.qdrant.collection_name);
        println!("  Provider:    {}", config.embedding.provider);
        println!("  Concurrency: {}", config.indexing.concurrency);
    }

    Ok(())
}
