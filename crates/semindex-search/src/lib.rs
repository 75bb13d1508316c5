//! semindex-search - embedding providers, Qdrant-backed vector store, and the
//! ingestion/query pipeline for the semindex code-search indexer.
//!
//! # Example
//!
//! ```ignore
//! use semindex_search::{VectorStore, QdrantConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = VectorStore::connect(QdrantConfig::local()).await?;
//!     store.ensure_collection(768).await?;
//!
//!     let results = store.search(query_vector, 10, None, None).await?;
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod branch_watcher;
pub mod cache;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod processor;
pub mod queue;
pub mod ranker;
pub mod schema;
pub mod search;
pub mod vector_store;
pub mod watcher;

pub use embeddings::jina_bert_v2;

// Re-exports for convenience
pub use batcher::{CrossFileBatcher, DEFAULT_BATCH_SIZE, DEFAULT_UPSERT_CHUNK};
pub use branch_watcher::{current_branch, BranchWatcher, DEFAULT_POLL_INTERVAL as DEFAULT_BRANCH_POLL_INTERVAL};
pub use cache::{search_cache_key, CacheStats, QueryCache};
pub use context::{extract as extract_context, DEFAULT_LINES_AFTER, DEFAULT_LINES_BEFORE};
pub use error::{Result, SearchError};
pub use processor::{
    BatchProcessor, BatchResult, FileResult, DEFAULT_CHUNK_PAUSE, DEFAULT_CHUNK_SIZE,
    DEFAULT_CONCURRENCY,
};
pub use queue::{DroppedTask, IndexingQueue, QueueStats, DEFAULT_MAX_RETRIES};
pub use ranker::{rank, RankedHit, RankerConfig};
pub use schema::{CollectionConfig, COLLECTION_NAME};
pub use search::{SearchQuery, SearchResult, SemanticSearch};
pub use vector_store::{QdrantConfig, SearchFilter, SearchHit, VectorStore};
pub use watcher::{FileWatcher, WatchEvent, WatchEventKind, DEFAULT_DEBOUNCE};

// Provider abstraction types, and the dimension constants real providers use.
pub use embeddings::{
    create_provider, validate_dimension, AzureMLAuth, AzureMLConfig, AzureMLProvider,
    EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType, LocalProvider, OpenAIConfig,
    OpenAIProvider, ProviderStatus, CODE_DIM, EMBEDDING_DIM, EXPECTED_DIM, SEMANTIC_DIM,
};
