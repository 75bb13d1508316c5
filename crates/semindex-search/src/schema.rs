//! Qdrant collection schema for semindex's single `code_blocks` collection.
//!
//! Unlike the dual semantic/code collections some code-search backends keep,
//! semindex embeds one enriched text per `CodeBlock` and stores one point per
//! block, so there is exactly one collection whose dimension tracks whatever
//! embedding provider is configured.

use qdrant_client::qdrant::Distance;

/// Collection name used by semindex-search.
pub const COLLECTION_NAME: &str = "code_blocks";

/// Payload field names, kept as constants so filter-building code and the
/// payload-index setup can't drift apart.
pub mod fields {
    pub const FILE: &str = "file";
    pub const CODE: &str = "code";
    pub const LINE: &str = "line";
    pub const END_LINE: &str = "end_line";
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const LANGUAGE: &str = "language";
    pub const PATH_SEGMENTS: &str = "pathSegments";
    pub const HASH: &str = "hash";
    pub const INDEXED_AT: &str = "indexed_at";
}

/// Configuration for the `code_blocks` collection. The dimension is not a
/// compile-time constant: it is set at collection-creation time from
/// whichever embedding provider is active (`EmbeddingProvider::embedding_dim`).
#[derive(Debug, Clone, Copy)]
pub struct CollectionConfig {
    pub name: &'static str,
    pub dimension: u64,
    pub distance: Distance,
}

impl CollectionConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            name: COLLECTION_NAME,
            dimension: dimension as u64,
            distance: Distance::Cosine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_config_tracks_provider_dimension() {
        let cfg = CollectionConfig::new(768);
        assert_eq!(cfg.name, COLLECTION_NAME);
        assert_eq!(cfg.dimension, 768);
        assert_eq!(cfg.distance, Distance::Cosine);
    }
}
