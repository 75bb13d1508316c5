//! Search command - semantic code search

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use semindex_search::{extract_context, SearchQuery, SemanticSearch};

use super::create_orchestrator;
use crate::GlobalOptions;

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of results to return
    #[arg(long, short = 'n', default_value = "10")]
    limit: u64,

    /// Minimum similarity score (0.0 - 1.0)
    #[arg(long, default_value = "0.7")]
    min_score: f32,

    /// Restrict results to these file extensions (e.g. rs, py)
    #[arg(long, short = 't')]
    types: Vec<String>,

    /// Restrict results to these languages (e.g. rust, python)
    #[arg(long)]
    languages: Vec<String>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', default_value = "text")]
    output: OutputFormat,

    /// Include surrounding source lines in output
    #[arg(long, short = 's')]
    snippets: bool,

    /// Show file:line only (compact output)
    #[arg(long)]
    files_only: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let orchestrator = create_orchestrator(&global).await?;
    let indexer = orchestrator.indexer();

    let query = SearchQuery {
        query: args.query.clone(),
        limit: args.limit,
        score_threshold: Some(args.min_score),
        directory_prefix: None,
        file_types: args.types.clone(),
        paths: Vec::new(),
        languages: args.languages.clone(),
        block_types: Vec::new(),
    };

    let search = SemanticSearch::new(indexer.store(), indexer.embedder());
    let results = search.search(&query).await.context("Search failed")?;

    if results.is_empty() {
        if !global.quiet {
            eprintln!("No results found for: {}", args.query);
        }
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            if args.files_only {
                let mut seen = std::collections::HashSet::new();
                for result in &results {
                    let key = format!("{}:{}", result.file, result.line);
                    if seen.insert(key.clone()) {
                        println!("{key}");
                    }
                }
            } else {
                if !global.quiet {
                    println!(
                        "Found {} result(s) for \"{}\":\n",
                        results.len(),
                        args.query
                    );
                }

                for (i, result) in results.iter().enumerate() {
                    println!("{}. {} ({})", i + 1, result.name, result.block_type);
                    println!("   {}:{}", result.file, result.line);
                    println!(
                        "   Score: {:.3}  Language: {}",
                        result.score, result.language
                    );

                    if args.snippets {
                        let code = extract_context(indexer.root(), &result.file, result.line, 3, 3, true)
                            .unwrap_or_else(|| result.code.clone());
                        println!("   ---");
                        for line in code.lines().take(10) {
                            println!("   {line}");
                        }
                        if code.lines().count() > 10 {
                            println!("   ...");
                        }
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}
