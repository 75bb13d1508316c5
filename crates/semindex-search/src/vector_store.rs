//! Qdrant-backed vector store for `semindex_core::model::Point`s.
//!
//! Grounded on `client.rs`'s `QdrantStore` (connection setup, payload
//! indexing, batched upsert, delete-by-file, scroll) but built around the
//! core crate's single-collection `Point`/`PointPayload` schema instead of
//! the teacher's separate semantic/code collections and `u64` hash ids —
//! `Point::id` is already the SHA-256-derived UUID string from
//! `semindex_core::model::point_id`, so no id-generation step is needed here.

use qdrant_client::qdrant::{
    vectors_config::Config, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, FieldType, Filter, GetPointsBuilder, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use semindex_core::{BlockType, Point, PointPayload};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::{fields, CollectionConfig, COLLECTION_NAME};

/// Retry a remote Qdrant call with the shared backoff policy (§4.15: "all
/// remote calls must be wrapped by the retry helper"). Only connection/RPC
/// failures are retried; anything else (bad config, not-found) surfaces
/// immediately.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let config = semindex_core::error::BackoffConfig::default();
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_retryable(&e) && attempt < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying qdrant call after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable(e: &SearchError) -> bool {
    matches!(e, SearchError::Qdrant(_) | SearchError::Connection(_))
}

/// Configuration for connecting to Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl QdrantConfig {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// One hit from a similarity search: the stored point plus its score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Structured filter for [`VectorStore::search_filtered`]. Each populated
/// field narrows the result set; `directory_prefix` is AND-ed against the
/// rest, while `paths`/`languages`/`block_types` are each internally an OR
/// (match any listed value). `file_types` is carried here for the caller's
/// convenience but applied as a post-filter, not pushed down to Qdrant (see
/// `search_filtered`).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub directory_prefix: Option<String>,
    pub file_types: Vec<String>,
    pub paths: Vec<String>,
    pub languages: Vec<String>,
    pub block_types: Vec<BlockType>,
}

pub struct VectorStore {
    client: Qdrant,
}

impl VectorStore {
    /// Connect to Qdrant and verify reachability by listing collections.
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        info!("Connecting to Qdrant at {}", config.url);

        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::Connection(format!("failed to build Qdrant client: {e}")))?;

        client
            .list_collections()
            .await
            .map_err(|e| SearchError::Connection(format!("failed to connect to Qdrant: {e}")))?;

        info!("connected to Qdrant");
        Ok(Self { client })
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        with_retry(|| async { Ok(self.client.collection_exists(name).await?) }).await
    }

    /// Ensure the `code_blocks` collection exists with the given vector
    /// dimension, creating it and its payload indexes if absent.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let config = CollectionConfig::new(dimension);

        if self.collection_exists(config.name).await? {
            debug!("collection '{}' already exists", config.name);
            return Ok(());
        }

        info!(
            "creating collection '{}' (dim={}, distance={:?})",
            config.name, config.dimension, config.distance
        );

        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: config.dimension,
                distance: config.distance.into(),
                ..Default::default()
            })),
        };

        with_retry(|| async {
            Ok(self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(config.name).vectors_config(vectors_config.clone()),
                )
                .await?)
        })
        .await?;

        self.create_payload_indexes(config.name).await?;
        info!("collection '{}' created", config.name);
        Ok(())
    }

    async fn create_payload_indexes(&self, collection_name: &str) -> Result<()> {
        for (field, field_type) in [
            (fields::FILE, FieldType::Keyword),
            (fields::TYPE, FieldType::Keyword),
            (fields::NAME, FieldType::Keyword),
            (fields::LANGUAGE, FieldType::Keyword),
        ] {
            with_retry(|| async {
                Ok(self
                    .client
                    .create_field_index(CreateFieldIndexCollectionBuilder::new(
                        collection_name,
                        field,
                        field_type,
                    ))
                    .await?)
            })
            .await?;
        }
        debug!("payload indexes created for '{}'", collection_name);
        Ok(())
    }

    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        info!("deleting collection '{}'", name);
        with_retry(|| async { Ok(self.client.delete_collection(name).await?) }).await?;
        Ok(())
    }

    fn point_to_struct(point: &Point) -> PointStruct {
        let payload = Payload::try_from(json!({
            fields::FILE: point.payload.file,
            fields::LINE: point.payload.line,
            fields::END_LINE: point.payload.end_line,
            fields::TYPE: point.payload.block_type.as_str(),
            fields::NAME: point.payload.name,
            fields::LANGUAGE: point.payload.language,
            fields::PATH_SEGMENTS: point.payload.path_segments,
            fields::HASH: point.payload.hash,
            fields::INDEXED_AT: point.payload.indexed_at,
            fields::CODE: point.payload.code,
        }))
        .expect("point payload should serialize to JSON object");

        PointStruct::new(point.id.clone(), point.vector.clone(), payload)
    }

    /// Upsert points, chunked so a single request never grows unbounded.
    pub async fn upsert_points(&self, points: Vec<Point>, batch_size: usize) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let total = points.len();
        let batch_size = batch_size.max(1);

        for batch in points.chunks(batch_size) {
            let qdrant_points: Vec<PointStruct> = batch.iter().map(Self::point_to_struct).collect();
            with_retry(|| async {
                Ok(self
                    .client
                    .upsert_points(
                        UpsertPointsBuilder::new(COLLECTION_NAME, qdrant_points.clone()).wait(true),
                    )
                    .await?)
            })
            .await?;
        }

        debug!("upserted {} points", total);
        Ok(())
    }

    /// Delete all points belonging to a file. Used on file modification
    /// (delete-then-reindex) and deletion.
    pub async fn delete_points_by_file(&self, file: &str) -> Result<()> {
        with_retry(|| async {
            let filter = Filter::must([Condition::matches(fields::FILE, file.to_string())]);
            Ok(self
                .client
                .delete_points(
                    DeletePointsBuilder::new(COLLECTION_NAME)
                        .points(filter)
                        .wait(true),
                )
                .await?)
        })
        .await?;
        Ok(())
    }

    /// Similarity search, optionally filtered to a directory prefix and/or a
    /// set of block types. A thin convenience wrapper over
    /// [`Self::search_filtered`] for the common case.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        path_prefix: Option<&str>,
        block_types: Option<&[BlockType]>,
    ) -> Result<Vec<SearchHit>> {
        let filter = SearchFilter {
            directory_prefix: path_prefix.map(str::to_string),
            block_types: block_types.map(|t| t.to_vec()).unwrap_or_default(),
            ..Default::default()
        };
        self.search_filtered(query_vector, limit, None, &filter).await
    }

    /// Similarity search against the full structured filter §4.11 describes:
    /// `must_not payload.type == "metadata"` (no-op here since `BlockType`
    /// has no metadata variant, kept for shape parity with the spec), plus
    /// `must` conjunctions for directory prefix, and `should` disjunctions
    /// for file types, explicit paths, languages, and block types.
    pub async fn search_filtered(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let mut must = Vec::new();
        if let Some(prefix) = &filter.directory_prefix {
            let segments = semindex_core::PathSegments::decompose(prefix);
            for (depth, segment) in segments.into_map() {
                must.push(Condition::matches(
                    format!("{}.{}", fields::PATH_SEGMENTS, depth),
                    segment,
                ));
            }
        }

        if !filter.paths.is_empty() {
            let should: Vec<Condition> = filter
                .paths
                .iter()
                .map(|p| Condition::matches(fields::FILE, p.clone()))
                .collect();
            must.push(Condition::filter(Filter::should(should)));
        }

        // `file_types` matches by extension, which there is no payload index
        // for (only exact-value keyword indexes exist on `file`); applied as
        // a post-filter by the caller instead of pushed down to Qdrant.

        if !filter.languages.is_empty() {
            let should: Vec<Condition> = filter
                .languages
                .iter()
                .map(|lang| Condition::matches(fields::LANGUAGE, lang.clone()))
                .collect();
            must.push(Condition::filter(Filter::should(should)));
        }

        if !filter.block_types.is_empty() {
            let should: Vec<Condition> = filter
                .block_types
                .iter()
                .map(|t| Condition::matches(fields::TYPE, t.as_str().to_string()))
                .collect();
            must.push(Condition::filter(Filter::should(should)));
        }

        // Always exclude metadata-only points from semantic search results,
        // even though no current `BlockType` produces one — a future block
        // kind tagged this way must not leak into search without a code
        // change here too.
        must.push(Condition::filter(Filter::must_not(vec![Condition::matches(
            fields::TYPE,
            "metadata".to_string(),
        )])));

        let mut builder = SearchPointsBuilder::new(COLLECTION_NAME, query_vector, limit)
            .with_payload(true)
            .filter(Filter::must(must));
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }

        let response = with_retry(|| async { Ok(self.client.search_points(builder.clone()).await?) }).await?;
        Ok(response.result.into_iter().filter_map(Self::hit_from_point).collect())
    }

    /// Fetch one point by id, with its vector, for `find_similar`'s
    /// re-search-by-vector step.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<(Vec<f32>, PointPayload)>> {
        let response = with_retry(|| async {
            Ok(self
                .client
                .get_points(
                    GetPointsBuilder::new(COLLECTION_NAME, vec![id.to_string().into()])
                        .with_payload(true)
                        .with_vectors(true),
                )
                .await?)
        })
        .await?;

        let Some(retrieved) = response.result.into_iter().next() else {
            return Ok(None);
        };

        let vector = retrieved
            .vectors
            .and_then(|v| v.vectors_options)
            .and_then(|opts| match opts {
                qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v) => Some(v.data),
                _ => None,
            })
            .unwrap_or_default();

        let scored = qdrant_client::qdrant::ScoredPoint {
            id: retrieved.id,
            payload: retrieved.payload,
            score: 0.0,
            version: 0,
            vectors: None,
            shard_key: None,
            order_value: None,
        };
        Ok(Self::hit_from_point(scored).map(|hit| (vector, hit.payload)))
    }

    /// Scroll points for a file (used to detect stale points during reindex).
    pub async fn scroll_by_file(&self, file: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let response = with_retry(|| async {
            let filter = Filter::must([Condition::matches(fields::FILE, file.to_string())]);
            Ok(self
                .client
                .scroll(
                    ScrollPointsBuilder::new(COLLECTION_NAME)
                        .filter(filter)
                        .limit(limit)
                        .with_payload(true),
                )
                .await?)
        })
        .await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                Self::hit_from_point(qdrant_client::qdrant::ScoredPoint {
                    id: p.id,
                    payload: p.payload,
                    score: 0.0,
                    version: 0,
                    vectors: None,
                    shard_key: None,
                    order_value: None,
                })
            })
            .collect())
    }

    fn hit_from_point(point: qdrant_client::qdrant::ScoredPoint) -> Option<SearchHit> {
        use qdrant_client::qdrant::point_id::PointIdOptions;

        let payload = point.payload;
        let id = match point.id?.point_id_options? {
            PointIdOptions::Uuid(u) => u,
            PointIdOptions::Num(n) => n.to_string(),
        };

        let get_string = |key: &str| -> String {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default()
        };
        let get_u32 = |key: &str| -> u32 {
            payload
                .get(key)
                .and_then(|v| v.as_integer())
                .map(|i| i as u32)
                .unwrap_or(0)
        };
        let block_type = match get_string(fields::TYPE).as_str() {
            "function" => BlockType::Function,
            "method" => BlockType::Method,
            "class" => BlockType::Class,
            "interface" => BlockType::Interface,
            "type" => BlockType::Type,
            "constant" => BlockType::Constant,
            "variable" => BlockType::Variable,
            "module" => BlockType::Module,
            "namespace" => BlockType::Namespace,
            "struct" => BlockType::Struct,
            "enum" => BlockType::Enum,
            "trait" => BlockType::Trait,
            "impl" => BlockType::Impl,
            "markdown_section" => BlockType::MarkdownSection,
            _ => BlockType::Chunk,
        };

        Some(SearchHit {
            id,
            score: point.score,
            payload: PointPayload {
                file: get_string(fields::FILE),
                line: get_u32(fields::LINE),
                end_line: get_u32(fields::END_LINE),
                code: get_string(fields::CODE),
                block_type,
                name: get_string(fields::NAME),
                language: get_string(fields::LANGUAGE),
                path_segments: Default::default(),
                metadata: None,
                hash: get_string(fields::HASH),
                indexed_at: get_string(fields::INDEXED_AT),
            },
        })
    }

    pub async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<qdrant_client::qdrant::CollectionInfo>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }
        let info = with_retry(|| async { Ok(self.client.collection_info(name).await?) }).await?;
        Ok(info.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QdrantConfig::default();
        assert_eq!(config.url, "http://localhost:6334");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = QdrantConfig::with_url("http://qdrant:6334").api_key("test-key");
        assert_eq!(config.url, "http://qdrant:6334");
        assert_eq!(config.api_key, Some("test-key".to_string()));
    }
}
