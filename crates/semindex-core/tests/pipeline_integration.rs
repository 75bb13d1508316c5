//! End-to-end test of the local half of the indexing pipeline: discovery,
//! filtering, parsing, quality scoring, and enrichment, without any
//! embedding/vector-store collaborator.

use std::fs;

use semindex_core::{
    score_block, Discovery, DiscoveryConfig, EnrichFormat, EnrichOptions, Enricher, FileFilter,
    LineChunker, CodeParser, SupportedLanguage,
};

#[tokio::test]
async fn test_discover_filter_parse_enrich_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::write(
        root.join("src/main.rs"),
        "fn main() {\n    println!(\"hello world, this is real code\");\n}\n",
    )
    .unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "module.exports = {};").unwrap();
    fs::write(root.join(".gitignore"), "*.log\n").unwrap();
    fs::write(root.join("debug.log"), "noise").unwrap();

    let discovery = Discovery::new(DiscoveryConfig::default());
    let files = discovery.discover(root).await.unwrap();

    let rel_paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
    assert!(rel_paths.contains(&"src/main.rs"));
    assert!(!rel_paths.iter().any(|p| p.contains("node_modules")));
    assert!(!rel_paths.contains(&"debug.log"));

    let filter = FileFilter::new();
    assert!(!filter.should_ignore("src/main.rs", false));

    let source = fs::read_to_string(root.join("src/main.rs")).unwrap();
    let chunker = LineChunker { chunk_lines: 10 };
    let blocks = chunker.parse("src/main.rs", SupportedLanguage::Rust, &source);
    assert!(!blocks.is_empty());

    let scores: Vec<_> = blocks.iter().map(score_block).collect();
    assert!(scores.iter().any(|s| s.passes()));

    let enricher = Enricher::new();
    let enriched = enricher.enrich(
        &blocks[0],
        &EnrichOptions {
            format: EnrichFormat::Compact,
            ..Default::default()
        },
    );
    assert!(enriched.contains("src/main.rs"));
    assert!(enriched.contains("hello world"));
}
