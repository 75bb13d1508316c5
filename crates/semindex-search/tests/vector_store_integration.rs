//! Vector store integration tests
//!
//! These tests exercise `VectorStore` against a real Qdrant instance. Start
//! one locally and run with `--ignored`:
//!
//! ```bash
//! docker run -p 6334:6334 qdrant/qdrant
//! cargo test --package semindex-search --test vector_store_integration -- --ignored
//! ```

use semindex_core::{BlockType, CodeBlock, Point};
use semindex_search::{QdrantConfig, SearchFilter, VectorStore};

fn sample_point(file: &str, name: &str, vector: Vec<f32>) -> Point {
    let block = CodeBlock::new(
        file.to_string(),
        1,
        5,
        format!("fn {name}() {{}}"),
        BlockType::Function,
        Some(name.to_string()),
        "rust".to_string(),
    );
    Point::from_block(&block, vector, "2026-01-01T00:00:00Z".to_string())
}

#[tokio::test]
#[ignore = "requires a running Qdrant instance"]
async fn test_upsert_search_and_delete_round_trip() {
    let store = VectorStore::connect(QdrantConfig::local())
        .await
        .expect("connect to local qdrant");
    store.ensure_collection(4).await.expect("ensure collection");

    let points = vec![
        sample_point("src/auth/login.rs", "login", vec![1.0, 0.0, 0.0, 0.0]),
        sample_point("src/auth/logout.rs", "logout", vec![0.9, 0.1, 0.0, 0.0]),
        sample_point("src/billing/charge.rs", "charge", vec![0.0, 0.0, 1.0, 0.0]),
    ];
    store.upsert_points(points, 100).await.expect("upsert points");

    let hits = store
        .search(vec![1.0, 0.0, 0.0, 0.0], 5, None, None)
        .await
        .expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].payload.file, "src/auth/login.rs");

    let filtered = store
        .search_filtered(
            vec![1.0, 0.0, 0.0, 0.0],
            5,
            None,
            &SearchFilter {
                directory_prefix: Some("src/auth".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("filtered search");
    assert!(filtered.iter().all(|h| h.payload.file.starts_with("src/auth")));

    store
        .delete_points_by_file("src/auth/login.rs")
        .await
        .expect("delete by file");
    let remaining = store
        .scroll_by_file("src/auth/login.rs", 10)
        .await
        .expect("scroll");
    assert!(remaining.is_empty());
}
