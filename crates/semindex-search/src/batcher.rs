//! Cross-File Batcher: accumulates enriched `CodeBlock`s from however many
//! files are ready, embeds and upserts them once a watermark is crossed, and
//! clears on success — or on failure, so a partially-embedded batch is never
//! silently left half-applied.
//!
//! Grounded on `indexer.rs`'s `embedding_batch_size` /
//! `pending_nodes.chunks(self.embedding_batch_size).enumerate()` pattern —
//! same fixed-size chunking, same "continue past a failed batch" idea one
//! level up — generalized here from chunking one graph's worth of nodes to
//! accepting blocks pushed in from many files as discovery/parsing produces
//! them, and extended with the enrich -> embed -> upsert pipeline that
//! `indexer.rs` drove through `QdrantStore` directly.

use std::sync::Arc;

use chrono::Utc;

use semindex_core::quality::score_block;
use semindex_core::{CodeBlock, EnrichFormat, EnrichOptions, Enricher, Point};

use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::vector_store::VectorStore;

/// Default number of blocks buffered before a flush is due, carried over
/// from the teacher's own default (`embedding_batch_size: 200`).
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Default number of points per `upsert_points` call.
pub const DEFAULT_UPSERT_CHUNK: usize = 100;

/// Buffers blocks from any number of files and flushes them as one
/// enrich-embed-upsert pipeline run once `max_blocks_per_batch` is reached
/// (or the caller flushes early, e.g. at end of a processing run).
pub struct CrossFileBatcher {
    max_blocks_per_batch: usize,
    max_points_per_upsert: usize,
    quality_filter: bool,
    pending: Vec<CodeBlock>,
}

impl CrossFileBatcher {
    pub fn new(max_blocks_per_batch: usize, max_points_per_upsert: usize) -> Self {
        Self {
            max_blocks_per_batch: max_blocks_per_batch.max(1),
            max_points_per_upsert: max_points_per_upsert.max(1),
            quality_filter: true,
            pending: Vec::new(),
        }
    }

    pub fn with_quality_filter(mut self, enabled: bool) -> Self {
        self.quality_filter = enabled;
        self
    }

    /// Add blocks extracted from one file, dropping any that fail the
    /// quality filter (when enabled). Does not flush by itself — callers
    /// check `should_flush` and call `flush` explicitly.
    pub fn add_blocks(&mut self, blocks: Vec<CodeBlock>) {
        if self.quality_filter {
            self.pending
                .extend(blocks.into_iter().filter(|b| score_block(b).passes()));
        } else {
            self.pending.extend(blocks);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once enough blocks have accumulated to warrant a flush.
    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.max_blocks_per_batch
    }

    /// Enrich every pending block, embed the enriched text in one batch call,
    /// and upsert the resulting points in `max_points_per_upsert`-sized
    /// chunks. On any error the pending buffer is cleared before the error is
    /// returned — a batch is never retried partially applied.
    pub async fn flush(
        &mut self,
        embedder: &Arc<dyn EmbeddingProvider>,
        store: &VectorStore,
    ) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let blocks = std::mem::take(&mut self.pending);
        match flush_blocks(&blocks, self.max_points_per_upsert, embedder, store).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    /// Drop everything buffered without embedding or upserting it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

async fn flush_blocks(
    blocks: &[CodeBlock],
    max_points_per_upsert: usize,
    embedder: &Arc<dyn EmbeddingProvider>,
    store: &VectorStore,
) -> Result<usize> {
    let enricher = Enricher::new();
    let options = EnrichOptions {
        format: EnrichFormat::Compact,
        ..Default::default()
    };
    let texts: Vec<String> = blocks.iter().map(|b| enricher.enrich(b, &options)).collect();

    let vectors = embedder.encode_code(texts).await?;
    if vectors.len() != blocks.len() {
        return Err(SearchError::Embedding(format!(
            "embedder returned {} vectors for {} blocks",
            vectors.len(),
            blocks.len()
        )));
    }

    let now = Utc::now().to_rfc3339();
    let points: Vec<Point> = blocks
        .iter()
        .zip(vectors.into_iter())
        .map(|(block, vector)| Point::from_block(block, vector, now.clone()))
        .collect();

    let count = points.len();
    store.upsert_points(points, max_points_per_upsert).await?;
    Ok(count)
}
