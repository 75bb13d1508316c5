//! Batch Processor: parses files into blocks, drives the Cross-File Batcher,
//! and runs a bounded worker pool over a list of files.
//!
//! Grounded on `indexer.rs`'s `process_batch` (shared `AtomicUsize` cursor
//! handed to `concurrency` workers so each file is claimed exactly once,
//! independent of how unevenly sized the files are) and its
//! `chunks(self.embedding_batch_size)` chunked-run pacing, generalized from
//! one graph-building pass to the flat block/point pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use semindex_core::{CodeParser, SupportedLanguage};

use crate::batcher::CrossFileBatcher;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::vector_store::VectorStore;

/// Default worker-pool size for `process_batch`.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default chunk size for `process_chunked`.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Pause between chunks in `process_chunked`, so a long reindex doesn't
/// starve other work sharing the same Qdrant/embedder connections.
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(100);

/// Outcome of indexing a single file.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub file: String,
    pub success: bool,
    pub blocks_indexed: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Aggregate outcome of a `process_batch` run.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_blocks: usize,
    pub duration_ms: u64,
    pub errors: Vec<(String, String)>,
}

/// Parses files, feeds blocks into a shared [`CrossFileBatcher`], and flushes
/// it to the vector store once a watermark is crossed.
pub struct BatchProcessor {
    root: PathBuf,
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    parser: Arc<dyn CodeParser>,
    batcher: Mutex<CrossFileBatcher>,
    concurrency: usize,
    chunk_size: usize,
    chunk_pause: Duration,
}

impl BatchProcessor {
    pub fn new(
        root: PathBuf,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        parser: Arc<dyn CodeParser>,
    ) -> Self {
        Self {
            root,
            store,
            embedder,
            parser,
            batcher: Mutex::new(CrossFileBatcher::new(
                crate::batcher::DEFAULT_BATCH_SIZE,
                crate::batcher::DEFAULT_UPSERT_CHUNK,
            )),
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_pause: Duration) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_pause = chunk_pause;
        self
    }

    fn canonical_full_path(&self, file: &str) -> String {
        let p = Path::new(file);
        if p.is_absolute() {
            file.to_string()
        } else {
            self.root.join(p).to_string_lossy().into_owned()
        }
    }

    /// §4.7 `process_file`: parse, add to the shared batcher, flush if the
    /// batcher is past its watermark.
    pub async fn process_file(&self, file: &str) -> FileResult {
        let start = Instant::now();
        match self.process_file_inner(file).await {
            Ok(blocks_indexed) => FileResult {
                file: file.to_string(),
                success: true,
                blocks_indexed,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => FileResult {
                file: file.to_string(),
                success: false,
                blocks_indexed: 0,
                duration_ms: start.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        }
    }

    async fn process_file_inner(&self, file: &str) -> Result<usize> {
        let full_path = self.canonical_full_path(file);
        let language = SupportedLanguage::from_path(Path::new(file))
            .ok_or_else(|| {
                semindex_core::IndexError::new(semindex_core::ErrorKind::Parsing(format!(
                    "unsupported extension: {file}"
                )))
            })?;
        let source = tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            semindex_core::IndexError::new(semindex_core::ErrorKind::FileSystem(e.to_string()))
        })?;

        let blocks = self.parser.parse(file, language, &source);
        let added = blocks.len();

        let mut flushed = 0;
        {
            let mut batcher = self.batcher.lock().await;
            batcher.add_blocks(blocks);
            if batcher.should_flush() {
                flushed = batcher.flush(&self.embedder, &self.store).await?;
            }
        }
        let _ = flushed;
        Ok(added)
    }

    /// §4.7 `process_batch`: a bounded worker pool of `concurrency` tasks
    /// drain `files` via a shared atomic cursor, so files are claimed one at
    /// a time regardless of how long any single file takes.
    pub async fn process_batch(self: &Arc<Self>, files: Vec<String>) -> BatchResult {
        let start = Instant::now();
        let total = files.len();
        let files = Arc::new(files);
        let cursor = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let workers = self.concurrency.min(total.max(1));
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let processor = Arc::clone(self);
            let files = Arc::clone(&files);
            let cursor = Arc::clone(&cursor);
            let results = Arc::clone(&results);
            handles.push(tokio::spawn(async move {
                loop {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    if idx >= files.len() {
                        break;
                    }
                    let result = processor.process_file(&files[idx]).await;
                    results.lock().await.push(result);
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let flush_result = self.batcher.lock().await.flush(&self.embedder, &self.store).await;
        let flush_error = flush_result.err();

        let results = Arc::try_unwrap(results)
            .expect("all worker tasks joined, no other Arc<results> clone outstanding")
            .into_inner();
        let mut outcome = BatchResult {
            total,
            duration_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        };
        for r in results {
            if r.success {
                outcome.successful += 1;
                outcome.total_blocks += r.blocks_indexed;
            } else {
                outcome.failed += 1;
                outcome
                    .errors
                    .push((r.file.clone(), r.error.clone().unwrap_or_default()));
            }
        }
        if let Some(e) = flush_error {
            outcome.errors.push(("<final flush>".to_string(), e.to_string()));
        }
        outcome
    }

    /// §4.7 `process_chunked`: run `process_batch` over fixed-size chunks of
    /// `files`, pausing between chunks.
    pub async fn process_chunked(self: &Arc<Self>, files: Vec<String>) -> BatchResult {
        let mut aggregate = BatchResult::default();
        let start = Instant::now();
        let chunks: Vec<Vec<String>> = files
            .chunks(self.chunk_size)
            .map(|c| c.to_vec())
            .collect();
        let n_chunks = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let result = self.process_batch(chunk).await;
            aggregate.total += result.total;
            aggregate.successful += result.successful;
            aggregate.failed += result.failed;
            aggregate.total_blocks += result.total_blocks;
            aggregate.errors.extend(result.errors);
            if i + 1 < n_chunks {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }
        aggregate.duration_ms = start.elapsed().as_millis() as u64;
        aggregate
    }

    /// §4.7 `delete_file`: remove every point belonging to `file` from the
    /// vector store. Qdrant deletes points matching a payload filter
    /// server-side, so no client-side scroll-then-delete paging is needed.
    pub async fn delete_file(&self, file: &str) -> Result<()> {
        let full_path = self.canonical_full_path(file);
        self.store.delete_points_by_file(&full_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_full_path_joins_relative() {
        let processor_root = PathBuf::from("/repo");
        let joined = processor_root.join("src/main.rs");
        assert_eq!(joined, PathBuf::from("/repo/src/main.rs"));
    }

    #[test]
    fn test_batch_result_default_is_zeroed() {
        let result = BatchResult::default();
        assert_eq!(result.total, 0);
        assert_eq!(result.successful, 0);
        assert!(result.errors.is_empty());
    }
}
