//! Core data model: `CodeBlock`, `Point`, `IndexingTask`, state machine, stats.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::path_segmenter::PathSegments;

/// The kind of a semantic unit extracted from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Constant,
    Variable,
    Module,
    Namespace,
    Struct,
    Enum,
    Trait,
    Impl,
    MarkdownSection,
    Chunk,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Function => "function",
            BlockType::Method => "method",
            BlockType::Class => "class",
            BlockType::Interface => "interface",
            BlockType::Type => "type",
            BlockType::Constant => "constant",
            BlockType::Variable => "variable",
            BlockType::Module => "module",
            BlockType::Namespace => "namespace",
            BlockType::Struct => "struct",
            BlockType::Enum => "enum",
            BlockType::Trait => "trait",
            BlockType::Impl => "impl",
            BlockType::MarkdownSection => "markdown_section",
            BlockType::Chunk => "chunk",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional structured metadata carried by a `CodeBlock`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMetadata {
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub visibility: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub decorators: Vec<String>,
    pub comments: Option<String>,
    pub complexity: Option<f64>,
    pub level: Option<u32>,
}

/// The unit of indexing: a semantic span extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: String,
    pub file: String,
    pub line: u32,
    pub end_line: u32,
    pub code: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub name: String,
    pub language: String,
    pub metadata: Option<BlockMetadata>,
    pub hash: String,
}

impl CodeBlock {
    /// Construct a block, synthesizing an id, a non-empty name, and the
    /// content hash. Panics via `debug_assert!` in debug builds if the
    /// invariants (`line <= end_line`, non-empty trimmed code) are violated,
    /// mirroring the contract in the data model.
    pub fn new(
        file: impl Into<String>,
        line: u32,
        end_line: u32,
        code: impl Into<String>,
        block_type: BlockType,
        name: Option<String>,
        language: impl Into<String>,
    ) -> Self {
        let file = file.into();
        let code = code.into();
        let language = language.into();
        debug_assert!(line <= end_line, "line must be <= end_line");
        debug_assert!(!code.trim().is_empty(), "code must be non-empty after trim");

        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => "anonymous".to_string(),
        };
        let hash = digest_hex(&code);
        let id = point_id(&file, line, end_line);
        Self {
            id,
            file,
            line,
            end_line,
            code,
            block_type,
            name,
            language,
            metadata: None,
            hash,
        }
    }

    pub fn with_metadata(mut self, metadata: BlockMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// SHA-256 hex digest of arbitrary bytes, used both for `CodeBlock::hash` and
/// as the first step of point-id derivation.
pub fn digest_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive the UUID-shaped point id for `(file, line, end_line)`: the first
/// 128 bits of `SHA256("{file}:{line}:{end_line}")`, formatted as the
/// standard 8-4-4-4-12 hexadecimal UUID grouping. Deterministic and stable
/// across runs (S2).
pub fn point_id(file: &str, line: u32, end_line: u32) -> String {
    let input = format!("{file}:{line}:{end_line}");
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    let first32 = &hex[0..32];
    format!(
        "{}-{}-{}-{}-{}",
        &first32[0..8],
        &first32[8..12],
        &first32[12..16],
        &first32[16..20],
        &first32[20..32]
    )
}

/// The unit of storage: a `CodeBlock` materialized with a vector and payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Flat payload schema (§6.3): `pathSegments` is a mapping of numeric-string
/// keys to segments so the vector store can filter on directory prefixes
/// without substring search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub file: String,
    pub line: u32,
    pub end_line: u32,
    pub code: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub name: String,
    pub language: String,
    #[serde(rename = "pathSegments")]
    pub path_segments: HashMap<String, String>,
    pub metadata: Option<BlockMetadata>,
    pub hash: String,
    pub indexed_at: String,
}

impl Point {
    /// Build a `Point` from a `CodeBlock` and its embedded vector. `indexed_at`
    /// is passed in (ISO-8601 UTC) rather than computed here, so callers in
    /// contexts where wall-clock time must be injected (tests, replay) can
    /// control it.
    pub fn from_block(block: &CodeBlock, vector: Vec<f32>, indexed_at: String) -> Self {
        let segments = PathSegments::decompose(&block.file);
        Self {
            id: point_id(&block.file, block.line, block.end_line),
            vector,
            payload: PointPayload {
                file: block.file.clone(),
                line: block.line,
                end_line: block.end_line,
                code: block.code.clone(),
                block_type: block.block_type,
                name: block.name.clone(),
                language: block.language.clone(),
                path_segments: segments.into_map(),
                metadata: block.metadata.clone(),
                hash: block.hash.clone(),
                indexed_at,
            },
        }
    }
}

/// Why a task was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskReason {
    Initial,
    Modified,
    Created,
    Renamed,
    BranchSwitch,
}

/// A unit of indexing work. Priority descending, `added_at` ascending is the
/// queue's sort order; retried tasks sink to `priority = -1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingTask {
    pub file: String,
    pub priority: i64,
    pub retries: u32,
    pub added_at: u64,
    pub reason: TaskReason,
}

impl IndexingTask {
    pub fn new(file: impl Into<String>, priority: i64, reason: TaskReason, added_at: u64) -> Self {
        Self {
            file: file.into(),
            priority,
            retries: 0,
            added_at,
            reason,
        }
    }
}

/// Status state machine: {standby, indexing, indexed, error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Standby,
    Indexing,
    Indexed,
    Error,
}

impl Default for Status {
    fn default() -> Self {
        Status::Standby
    }
}

impl Status {
    /// Whether `self -> next` is a permitted transition.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Standby, Indexing)
                | (Indexing, Indexed)
                | (Indexing, Error)
                | (Indexing, Standby)
                | (Indexed, Indexing)
                | (Indexed, Standby)
                | (Error, Indexing)
                | (Error, Standby)
        )
    }
}

/// Progress snapshot for an in-flight or completed `index_all` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub status: Status,
    pub files_processed: usize,
    pub files_total: usize,
    pub current_file: Option<String>,
    pub start_time: Option<u64>,
    pub estimated_time_remaining: Option<u64>,
    pub rate: Option<f64>,
}

impl Progress {
    /// `percentage = min(100, files_processed/files_total*100)` when
    /// `files_total>0`, else 0.
    pub fn percentage(&self) -> f64 {
        if self.files_total == 0 {
            0.0
        } else {
            (self.files_processed as f64 / self.files_total as f64 * 100.0).min(100.0)
        }
    }
}

/// Accumulated indexing statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_blocks: usize,
    pub total_vectors: usize,
    pub total_files: usize,
    pub languages: HashMap<String, usize>,
    pub file_types: HashMap<String, usize>,
    pub last_indexed: Option<String>,
    pub indexing_time_ms: u64,
    pub avg_blocks_per_file: f64,
    pub failure_rate_percent: f64,
}

/// The indexer's externally-visible state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerState {
    pub is_running: bool,
    pub is_watching: bool,
    pub current_branch: Option<String>,
    pub queue_size: usize,
    pub progress: Progress,
    pub stats: Stats,
    pub errors: VecDeque<String>,
}

impl Default for IndexerState {
    fn default() -> Self {
        Self {
            is_running: false,
            is_watching: false,
            current_branch: None,
            queue_size: 0,
            progress: Progress::default(),
            stats: Stats::default(),
            errors: VecDeque::new(),
        }
    }
}

/// Bounded error ring capacity (`<=100`).
pub const ERROR_RING_CAPACITY: usize = 100;

impl IndexerState {
    /// Push an error into the bounded ring, dropping the oldest entry when full.
    pub fn push_error(&mut self, message: impl Into<String>) {
        if self.errors.len() >= ERROR_RING_CAPACITY {
            self.errors.pop_front();
        }
        self.errors.push_back(message.into());
    }
}
