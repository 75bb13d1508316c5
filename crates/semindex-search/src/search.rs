//! Semantic Search: builds a structured filter, embeds the query, invokes
//! the vector store, and maps results — the entry point the Tool Dispatcher
//! calls through the cache.
//!
//! Grounded on `hybrid.rs::HybridSearcher` for the overall connect/search
//! shape (owns a store handle and an embedding source, exposes a `search`
//! method that classifies nothing here since there is one collection, not
//! two to choose a fusion weight between) but without RRF fusion — one
//! collection means the vector store's own score is the base, and the
//! `ranker` module layers the exact-match/name-match/recency/complexity
//! adjustments on top instead of a weighted blend across collections.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::vector_store::{SearchFilter, SearchHit, VectorStore};
use semindex_core::BlockType;

/// One mapped, query-independent search result record.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub file: String,
    pub line: u32,
    pub code: String,
    pub block_type: BlockType,
    pub name: String,
    pub score: f32,
    pub language: String,
    pub metadata: Option<semindex_core::BlockMetadata>,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            file: hit.payload.file,
            line: hit.payload.line,
            code: hit.payload.code,
            block_type: hit.payload.block_type,
            name: hit.payload.name,
            score: hit.score,
            language: hit.payload.language,
            metadata: hit.payload.metadata,
        }
    }
}

/// Parameters accepted by `search` — mirrors the `codebase_search` tool's
/// input shape.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub limit: u64,
    pub score_threshold: Option<f32>,
    pub directory_prefix: Option<String>,
    pub file_types: Vec<String>,
    pub paths: Vec<String>,
    pub languages: Vec<String>,
    pub block_types: Vec<BlockType>,
}

pub struct SemanticSearch {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SemanticSearch {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    fn matches_file_type(file: &str, file_types: &[String]) -> bool {
        if file_types.is_empty() {
            return true;
        }
        file_types
            .iter()
            .any(|ext| file.ends_with(&format!(".{ext}")) || file.ends_with(ext))
    }

    /// §4.11 `search`: embed the query, build the structured filter, invoke
    /// the vector store, map to result records. `file_types` is applied as a
    /// post-filter since Qdrant has no extension index to push it into.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let mut vectors = self.embedder.encode_code(vec![query.query.clone()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("embedder returned no vector for query".into()))?;

        let filter = SearchFilter {
            directory_prefix: query.directory_prefix.clone(),
            file_types: query.file_types.clone(),
            paths: query.paths.clone(),
            languages: query.languages.clone(),
            block_types: query.block_types.clone(),
        };

        // Over-fetch so the file_types post-filter still has enough to return.
        let fetch_limit = if query.file_types.is_empty() {
            query.limit
        } else {
            query.limit.saturating_mul(3).max(query.limit)
        };

        let hits = self
            .store
            .search_filtered(vector, fetch_limit, query.score_threshold, &filter)
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| Self::matches_file_type(&hit.payload.file, &query.file_types))
            .take(query.limit as usize)
            .map(SearchResult::from)
            .collect();

        Ok(results)
    }

    /// §4.11 `find_similar`: retrieve the stored point by id, re-search with
    /// its vector, drop the origin id from results, take `limit`.
    pub async fn find_similar(&self, id: &str, limit: u64) -> Result<Vec<SearchResult>> {
        let Some((vector, _payload)) = self.store.get_by_id(id).await? else {
            return Ok(Vec::new());
        };

        let hits = self
            .store
            .search(vector, limit + 1, None, None)
            .await?
            .into_iter()
            .filter(|hit| hit.id != id)
            .take(limit as usize)
            .map(SearchResult::from)
            .collect();

        Ok(hits)
    }
}
