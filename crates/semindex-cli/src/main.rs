//! semindex - semantic code search and indexing CLI
//!
//! Thin command-line front end over `semindex-mcp`'s orchestrator: the same
//! indexer, embedder, and Qdrant connection the MCP server uses, driven
//! one-shot from a terminal instead of over stdio.
//!
//! # Usage
//!
//! ```bash
//! # Initialize a workspace and run an initial index
//! semindex init
//!
//! # Search for code by meaning
//! semindex search "retry with backoff"
//!
//! # Start the MCP server for AI assistant integration
//! semindex mcp
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// semindex - semantic code search and indexing
#[derive(Parser, Debug)]
#[command(name = "semindex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Workspace to operate on (path, default: current directory)
    #[arg(long, short = 'w', global = true, env = "SEMINDEX_WORKSPACE")]
    pub workspace: Option<String>,

    /// Path to configuration file to load instead of the standard lookup
    #[arg(long, short = 'c', global = true, env = "SEMINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Qdrant server URL override
    #[arg(long, global = true, env = "SEMINDEX_QDRANT_URL")]
    pub qdrant_url: Option<String>,

    /// Embedding provider type (local, azure-ml, openai)
    #[arg(long, global = true, env = "SEMINDEX_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    pub embedding_provider: Option<semindex_config::EmbeddingProviderType>,
}

/// Parse embedding provider from string
fn parse_embedding_provider(s: &str) -> Result<semindex_config::EmbeddingProviderType, String> {
    s.parse()
        .map_err(|e: semindex_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> semindex_config::ConfigOverrides {
        semindex_config::ConfigOverrides {
            qdrant_url: self.qdrant_url.clone(),
            embedding_provider: self.embedding_provider,
            log_level: if self.verbose {
                Some(semindex_config::LogLevel::Debug)
            } else if self.quiet {
                Some(semindex_config::LogLevel::Error)
            } else {
                None
            },
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a workspace and run an initial index
    Init(commands::init::InitArgs),

    /// Reindex the workspace (incremental by default)
    Index(commands::index::IndexArgs),

    /// Search the codebase semantically
    Search(commands::search::SearchArgs),

    /// Show indexing status and progress
    Status(commands::status::StatusArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Delete the active Qdrant collection
    Clean(commands::clean::CleanArgs),

    /// Start the MCP server for AI assistant integration
    Mcp(commands::mcp::McpArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // MCP command handles its own tracing setup (needs ansi=false for JSON-RPC protocol,
    // and must gracefully handle pre-existing subscribers when launched by an AI assistant)
    if !matches!(cli.command, Commands::Mcp(_)) {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.global).await,
        Commands::Index(args) => commands::index::execute(args, cli.global).await,
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
        Commands::Clean(args) => commands::clean::execute(args, cli.global).await,
        Commands::Mcp(args) => commands::mcp::execute(args, cli.global).await,
    }
}
