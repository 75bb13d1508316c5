//! File Hash Cache: content-addressed change detector.
//!
//! Primary key is the cheap `(path, mtime, size)` stamp used by
//! `index_all` to skip unchanged files without reading their content;
//! `content_digest` provides the heavier SHA-256 content hash for callers
//! that need a stronger identity (e.g. `CodeBlock::hash`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cheap per-file stamp: last-modified time (ms since epoch) and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub mtime_ms: u64,
    pub size: u64,
}

impl FileStamp {
    /// The `"{full_path}:{mtime_ms}:{size}"` cache key used by `index_all`
    /// step 3 to decide whether a file is unchanged.
    pub fn cache_key(full_path: &str, mtime_ms: u64, size: u64) -> String {
        format!("{full_path}:{mtime_ms}:{size}")
    }

    /// Read the stamp for a file directly from filesystem metadata.
    pub fn for_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mtime_ms = meta
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            mtime_ms,
            size: meta.len(),
        })
    }
}

/// Content-addressed change detector keyed by path, storing the last-seen
/// `(mtime, size)` stamp for each file. Single-writer from the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileHashCache {
    stamps: HashMap<String, FileStamp>,
}

impl FileHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `path` was previously recorded with the same `(mtime, size)`.
    pub fn is_unchanged(&self, path: &str, stamp: FileStamp) -> bool {
        self.stamps.get(path) == Some(&stamp)
    }

    /// Record (or update) the stamp for `path`.
    pub fn update(&mut self, path: impl Into<String>, stamp: FileStamp) {
        self.stamps.insert(path.into(), stamp);
    }

    /// Remove a path from the cache (e.g. on deletion).
    pub fn remove(&mut self, path: &str) {
        self.stamps.remove(path);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Persist the cache to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    /// Load a cache from a JSON file, returning an empty cache if it does
    /// not yet exist.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        match File::open(path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                serde_json::from_reader(reader).map_err(|e| std::io::Error::other(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }
}

/// Compute the SHA-256 content digest of a file, reading it in chunks.
pub fn content_digest(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(8192, file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
