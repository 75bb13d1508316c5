//! LRU + TTL result cache, exclusively owned by the search engine.
//!
//! No direct teacher analog (the teacher re-runs every search against
//! Qdrant); built on the `lru` crate the way the rest of this crate reaches
//! for a focused, well-known crate over a hand-rolled cache — the same
//! posture as `once_cell` for the embedding providers' lazily-initialized
//! models. `lru::LruCache` already gives insertion-order tracking with
//! recency bumped on `get`/`put`, so the capacity-bounded, LRU-eviction half
//! of the contract is the crate; the TTL half and the `has`/`stats`/
//! `cleanup` surface are layered on top.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use semindex_core::digest_hex;

use crate::vector_store::SearchHit;

struct CachedEntry {
    value: Vec<SearchHit>,
    inserted_at: Instant,
}

/// Point-in-time occupancy and hit-rate snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Capacity-bounded, insertion-order-eviction, time-based-expiry result
/// cache.
pub struct QueryCache {
    cache: LruCache<String, CachedEntry>,
    ttl: Duration,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            cache: LruCache::new(capacity),
            ttl,
            capacity: capacity.get(),
            hits: 0,
            misses: 0,
        }
    }

    /// `get` removes then re-inserts to mark recency and increments the hit
    /// counter on a hit. An expired entry is treated as absent and deleted
    /// lazily.
    pub fn get(&mut self, key: &str) -> Option<Vec<SearchHit>> {
        let Some(entry) = self.cache.pop(key) else {
            self.misses += 1;
            return None;
        };
        if entry.inserted_at.elapsed() > self.ttl {
            self.misses += 1;
            return None;
        }
        let value = entry.value.clone();
        self.cache.put(key.to_string(), entry);
        self.hits += 1;
        Some(value)
    }

    /// Insert or overwrite. Evicts the least-recently-used entry if at
    /// capacity and `key` is new.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<SearchHit>) {
        self.cache.put(
            key.into(),
            CachedEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Whether `key` is present and not expired, without affecting recency
    /// or the hit counter.
    pub fn has(&mut self, key: &str) -> bool {
        match self.cache.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() <= self.ttl,
            None => false,
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.cache.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn size(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Sweeps all expired entries, returning the count removed.
    pub fn cleanup(&mut self) -> usize {
        let expired: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.cache.pop(key);
        }
        expired.len()
    }

    /// Drop every cached entry touching a file, after a reindex of that file.
    pub fn invalidate_file(&mut self, file: &str) {
        let stale: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.value.iter().any(|hit| hit.payload.file == file))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.cache.pop(key);
        }
    }
}

/// Derives the search cache key: digest of the tuple
/// `(query, limit, threshold, file_types, paths, languages, include_context)`
/// truncated to 16 hex chars.
#[allow(clippy::too_many_arguments)]
pub fn search_cache_key(
    query: &str,
    limit: u64,
    threshold: f32,
    file_types: &[String],
    paths: &[String],
    languages: &[String],
    include_context: bool,
) -> String {
    let fingerprint = format!(
        "{query}\u{1}{limit}\u{1}{threshold}\u{1}{}\u{1}{}\u{1}{}\u{1}{include_context}",
        file_types.join(","),
        paths.join(","),
        languages.join(","),
    );
    digest_hex(&fingerprint)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_core::{BlockType, PointPayload};

    fn hit(file: &str) -> SearchHit {
        SearchHit {
            id: "id".into(),
            score: 1.0,
            payload: PointPayload {
                file: file.into(),
                line: 1,
                end_line: 2,
                code: "fn a() {}".into(),
                block_type: BlockType::Function,
                name: "a".into(),
                language: "rust".into(),
                path_segments: Default::default(),
                metadata: None,
                hash: "h".into(),
                indexed_at: "now".into(),
            },
        }
    }

    #[test]
    fn test_set_then_get_roundtrips_and_counts_hit() {
        let mut cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("k", vec![hit("a.rs")]);
        let hits = cache.get("k").expect("should be cached");
        assert_eq!(hits.len(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_get_miss_counts_miss() {
        let mut cache = QueryCache::new(10, Duration::from_secs(60));
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_treated_as_absent() {
        let mut cache = QueryCache::new(10, Duration::from_millis(1));
        cache.set("k", vec![hit("a.rs")]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_capacity_one_evicts_first_on_second_insert() {
        let mut cache = QueryCache::new(1, Duration::from_secs(60));
        cache.set("first", vec![hit("a.rs")]);
        cache.set("second", vec![hit("b.rs")]);
        assert_eq!(cache.size(), 1);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
    }

    #[test]
    fn test_cleanup_sweeps_all_expired() {
        let mut cache = QueryCache::new(10, Duration::from_millis(1));
        cache.set("a", vec![hit("a.rs")]);
        cache.set("b", vec![hit("b.rs")]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_invalidate_file_removes_matching_entries() {
        let mut cache = QueryCache::new(10, Duration::from_secs(60));
        cache.set("k", vec![hit("a.rs"), hit("b.rs")]);
        cache.invalidate_file("a.rs");
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_cache_key_is_16_hex_chars_and_sensitive_to_filters() {
        let k1 = search_cache_key("foo", 10, 0.7, &[], &[], &[], true);
        let k2 = search_cache_key("foo", 10, 0.7, &["rs".to_string()], &[], &[], true);
        assert_eq!(k1.len(), 16);
        assert_ne!(k1, k2);
    }
}
