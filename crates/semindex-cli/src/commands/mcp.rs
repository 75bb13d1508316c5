//! MCP server command
//!
//! Starts the semindex MCP server for AI assistant integration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use semindex_mcp::{PrismServer, ServerConfig};
use rmcp::{transport::stdio, ServiceExt};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

use super::load_config;
use crate::GlobalOptions;

/// Start the MCP server for AI assistant integration
#[derive(Args, Debug)]
pub struct McpArgs {
    /// Path to workspace root directory (default: current directory or --workspace)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log file path (default: stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Execute the MCP server command
pub async fn execute(args: McpArgs, global: GlobalOptions) -> Result<()> {
    // Set up logging (must be stderr - stdout is for MCP JSON-RPC protocol)
    let log_level = if args.debug || global.verbose {
        Level::DEBUG
    } else if global.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    // Use try_init() to gracefully handle the case where a global subscriber
    // is already set (e.g., when launched by an AI assistant host)
    if let Some(ref log_file) = args.log_file {
        let file = std::fs::File::create(log_file)
            .with_context(|| format!("Failed to create log file: {}", log_file.display()))?;
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(file)
            .with_ansi(false)
            .finish();
        if subscriber.try_init().is_err() {
            warn!(
                "Note: Using existing tracing subscriber (--log-file {} ignored)",
                log_file.display()
            );
        }
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        let _ = subscriber.try_init();
    }

    let root_path = args
        .root
        .or_else(|| global.workspace.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let root_path = root_path.canonicalize().unwrap_or(root_path);

    if !root_path.exists() {
        anyhow::bail!("Root path does not exist: {}", root_path.display());
    }

    let config = load_config(&global, &root_path).context("Failed to load configuration")?;

    info!("Starting semindex MCP server");
    info!("  Root: {}", root_path.display());
    info!("  Qdrant: {}", config.qdrant.url);
    info!("  Embedding provider: {}", config.embedding.provider);

    let server_config = ServerConfig { workspace_root: root_path, config };

    let server = PrismServer::new(server_config)
        .await
        .context("Failed to create MCP server")?;

    info!("Server initialized, starting MCP protocol over stdio");

    let server_for_shutdown = server.clone();

    let service = server
        .serve(stdio())
        .await
        .context("Failed to start MCP service")?;

    tokio::select! {
        result = service.waiting() => {
            if let Err(e) = result {
                info!("Service ended with error: {}", e);
            } else {
                info!("Service ended normally");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            server_for_shutdown.shutdown();
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
