//! semindex-core - Data model and local components for the semantic code-search indexer
//!
//! This crate holds the parts of the indexing pipeline that have no external
//! collaborator: the data model (`CodeBlock`, `Point`, tasks, state), the path
//! segmenter, the file hash cache, the gitignore-dialect file filter, parallel
//! file discovery, the quality filter, the enricher, a parser trait plus a
//! line-chunker fallback, and the error taxonomy.

pub mod discovery;
pub mod enricher;
pub mod error;
pub mod filter;
pub mod hash_cache;
pub mod model;
pub mod parser;
pub mod path_segmenter;
pub mod quality;

pub use discovery::{DiscoveredFile, Discovery, DiscoveryConfig, DiscoveryError};
pub use enricher::{EnrichFormat, EnrichOptions, Enricher};
pub use error::{ErrorContext, ErrorKind, IndexError, Result};
pub use filter::FileFilter;
pub use hash_cache::{FileHashCache, FileStamp};
pub use model::{
    digest_hex, point_id, BlockMetadata, BlockType, CodeBlock, IndexerState, IndexingTask, Point,
    PointPayload, Progress, Stats, Status, TaskReason, ERROR_RING_CAPACITY,
};
pub use parser::{CodeParser, LineChunker, SupportedLanguage};
pub use path_segmenter::{decompose, join_segments, PathSegments};
pub use quality::{score_block, QualityScore, QUALITY_THRESHOLD};
