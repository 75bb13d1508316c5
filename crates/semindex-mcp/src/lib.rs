//! semindex-mcp - MCP server exposing semantic code search and indexing tools
//!
//! This crate provides an MCP (Model Context Protocol) server that lets AI
//! assistants search an indexed codebase by meaning and control the indexer
//! that keeps that index up to date.
//!
//! # Features
//!
//! - **Semantic search**: `codebase_search` over embedded code blocks
//! - **Indexing control**: status, reindex, configure, clear, validate
//! - **Background watchers**: file changes and branch switches trigger reindexing

pub mod error;
pub mod orchestrator;
pub mod server;
pub mod status;
pub mod tools;

// Re-exports
pub use error::{McpError, Result};
pub use orchestrator::{IndexOptions, IndexerOrchestrator, Orchestrator};
pub use server::{PrismServer, ServerConfig};
pub use status::StatusManager;
