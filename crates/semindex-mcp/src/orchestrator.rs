//! Orchestration: the per-workspace Indexer Orchestrator that drives a full
//! or incremental indexing run, and the top-level Orchestrator that owns
//! construction order and `reconfigure`.
//!
//! Grounded on the teacher's `PrismServer::new` startup sequence (manifest
//! check, graph open, searcher connect with graceful degradation, preload,
//! conditional initial index, updater init, background task spawn) and on
//! `indexer.rs`'s worker-pool-over-shared-cursor batch processing, now
//! generalized from graph construction to the flat block/point pipeline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};

use semindex_core::{
    CodeParser, Discovery, DiscoveryConfig, FileHashCache, FileStamp, IndexerState, LineChunker,
    Status, TaskReason,
};
use semindex_search::{
    current_branch, AzureMLConfig, BatchProcessor, BranchWatcher,
    EmbeddingConfig as SearchEmbeddingConfig, EmbeddingProvider, FileWatcher, IndexingQueue,
    OpenAIConfig, QdrantConfig as SearchQdrantConfig, VectorStore, WatchEvent, WatchEventKind,
    DEFAULT_BRANCH_POLL_INTERVAL, DEFAULT_DEBOUNCE,
};
use semindex_config::{ConfigOverrides, EmbeddingProviderType, SemindexConfig};

use crate::error::{McpError, Result};
use crate::status::StatusManager;

/// Pause between drained batches, so a long reindex shares the Qdrant and
/// embedder connections with concurrently arriving file-watch events.
const DRAIN_PAUSE: Duration = Duration::from_millis(50);

/// Number of queued tasks pulled into a single `process_batch` call.
const DRAIN_BATCH_SIZE: usize = 50;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Options for a `index_all` run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Skip the hash-cache unchanged-file filter and reindex everything.
    pub force: bool,
}

/// Builds a `semindex_search` embedding provider from the generic
/// `semindex_config::EmbeddingConfig`. Azure ML and OpenAI endpoints read
/// most of their shape from the environment (the config layer only carries
/// a single `base_url`/`api_key`/`model` triple); any of those present in
/// config override the environment-sourced defaults.
fn build_embedder(
    cfg: &semindex_config::EmbeddingConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, semindex_search::SearchError> {
    let search_config = match cfg.provider {
        EmbeddingProviderType::Local => SearchEmbeddingConfig::local(),
        EmbeddingProviderType::AzureMl => {
            let mut azure = AzureMLConfig::from_env().unwrap_or_else(|_| AzureMLConfig {
                semantic_endpoint: cfg.base_url.clone().unwrap_or_default(),
                code_endpoint: cfg.base_url.clone().unwrap_or_default(),
                semantic_auth: semindex_search::AzureMLAuth::ApiKey(
                    cfg.api_key.clone().unwrap_or_default(),
                ),
                code_auth: None,
                timeout_secs: 30,
                max_retries: 3,
                #[cfg(feature = "rate-limit")]
                requests_per_second: 10,
            });
            if let Some(url) = &cfg.base_url {
                azure.semantic_endpoint = url.clone();
                azure.code_endpoint = url.clone();
            }
            SearchEmbeddingConfig::azure_ml_with_config(azure)
        }
        EmbeddingProviderType::Openai => {
            let mut openai = OpenAIConfig::from_env().unwrap_or_else(|_| OpenAIConfig::ollama());
            if let Some(url) = &cfg.base_url {
                openai.base_url = url.clone();
            }
            if cfg.api_key.is_some() {
                openai.api_key = cfg.api_key.clone();
            }
            if let Some(model) = &cfg.model {
                openai.semantic_model = model.clone();
            }
            SearchEmbeddingConfig::openai_with_config(openai)
        }
    };
    semindex_search::create_provider(&search_config)
}

fn search_qdrant_config(cfg: &semindex_config::QdrantConfig) -> SearchQdrantConfig {
    let mut qc = SearchQdrantConfig::with_url(cfg.url.clone());
    if let Some(key) = &cfg.api_key {
        qc = qc.api_key(key.clone());
    }
    qc
}

/// Drives one workspace's indexing pipeline: discovery, the hash-cache
/// unchanged-file filter, the priority queue, the batch processor, and the
/// file/branch watchers. One instance per workspace root.
pub struct IndexerOrchestrator {
    root: PathBuf,
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    status: Arc<StatusManager>,
    queue: Mutex<IndexingQueue>,
    processor: Arc<BatchProcessor>,
    hash_cache: Mutex<FileHashCache>,
    discovery: Discovery,
    watch_enabled: bool,
    branch_watch_enabled: bool,
    draining: AtomicBool,
    file_watcher: Mutex<Option<FileWatcher>>,
    branch_watcher: Mutex<Option<BranchWatcher>>,
}

impl IndexerOrchestrator {
    pub fn new(
        root: PathBuf,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        parser: Arc<dyn CodeParser>,
        status: Arc<StatusManager>,
        concurrency: usize,
        max_retries: u32,
        watch_enabled: bool,
        branch_watch_enabled: bool,
    ) -> Self {
        let processor = Arc::new(
            BatchProcessor::new(root.clone(), Arc::clone(&store), Arc::clone(&embedder), parser)
                .with_concurrency(concurrency),
        );
        Self {
            root,
            store,
            embedder,
            status,
            queue: Mutex::new(IndexingQueue::new(max_retries)),
            processor,
            hash_cache: Mutex::new(FileHashCache::new()),
            discovery: Discovery::new(DiscoveryConfig::default()),
            watch_enabled,
            branch_watch_enabled,
            draining: AtomicBool::new(false),
            file_watcher: Mutex::new(None),
            branch_watcher: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    pub fn store(&self) -> Arc<VectorStore> {
        Arc::clone(&self.store)
    }

    pub fn get_state(&self) -> IndexerState {
        self.status.snapshot()
    }

    /// Ensure the collection exists at the embedder's dimension, then start
    /// the file and branch watchers if enabled.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        self.store
            .ensure_collection(self.embedder.embedding_dim())
            .await
            .map_err(McpError::Search)?;

        if let Some(branch) = current_branch(&self.root) {
            self.status.update(|s| s.current_branch = Some(branch));
        }

        if self.watch_enabled {
            self.start_file_watcher()?;
        }
        if self.branch_watch_enabled {
            self.start_branch_watcher();
        }
        Ok(())
    }

    fn start_file_watcher(self: &Arc<Self>) -> Result<()> {
        let (watcher, mut rx) = FileWatcher::watch(&self.root, DEFAULT_DEBOUNCE)?;
        *self.file_watcher.lock().unwrap() = Some(watcher);

        let me = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = me.handle_change(event).await {
                    warn!(error = %e, "failed to handle file-watch event");
                }
            }
        });
        self.status.update(|s| s.is_watching = true);
        Ok(())
    }

    fn start_branch_watcher(self: &Arc<Self>) {
        let me = Arc::clone(self);
        let root = self.root.clone();
        let watcher = BranchWatcher::start(root, DEFAULT_BRANCH_POLL_INTERVAL, move |old, new| {
            let me = Arc::clone(&me);
            tokio::spawn(async move {
                me.handle_branch_change(old, new).await;
            });
        });
        *self.branch_watcher.lock().unwrap() = Some(watcher);
    }

    fn abs_path(&self, rel: &str) -> PathBuf {
        let p = std::path::Path::new(rel);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// §4.10 `index_all`: discover, filter unchanged files through the hash
    /// cache (unless `force`), enqueue the rest, then drain the queue.
    pub async fn index_all(self: &Arc<Self>, options: IndexOptions) -> Result<()> {
        if self.status.snapshot().is_running {
            return Err(McpError::AlreadyRunning);
        }
        if !self.status.transition(Status::Indexing) {
            return Err(McpError::AlreadyRunning);
        }
        self.status.update(|s| {
            s.is_running = true;
            s.progress.start_time = Some(now_ms());
            s.progress.files_processed = 0;
            s.progress.current_file = None;
        });

        let discovered = match self.discovery.discover(&self.root).await {
            Ok(files) => files,
            Err(e) => {
                self.status.push_error(e.to_string());
                self.status.update(|s| s.is_running = false);
                self.status.transition(Status::Error);
                return Err(McpError::Internal(e.to_string()));
            }
        };

        let mut pending = Vec::with_capacity(discovered.len());
        {
            let cache = self.hash_cache.lock().unwrap();
            for file in &discovered {
                let full_path = file.abs_path.to_string_lossy().into_owned();
                if !options.force {
                    if let Ok(stamp) = FileStamp::for_path(&file.abs_path) {
                        if cache.is_unchanged(&full_path, stamp) {
                            continue;
                        }
                    }
                }
                pending.push(file.rel_path.clone());
            }
        }

        self.status.update(|s| s.progress.files_total = pending.len());

        {
            let mut queue = self.queue.lock().unwrap();
            let added_at = now_ms();
            for rel_path in &pending {
                queue.add(rel_path.clone(), 1, TaskReason::Initial, added_at);
            }
            self.status.update(|s| s.queue_size = queue.size());
        }

        self.drain_queue().await;

        let point_count = self
            .store
            .collection_info(semindex_search::COLLECTION_NAME)
            .await
            .ok()
            .flatten()
            .and_then(|info| info.points_count)
            .unwrap_or(0);

        self.status.update(|s| {
            s.is_running = false;
            s.stats.total_vectors = point_count as usize;
            s.stats.total_files = discovered.len();
            s.stats.last_indexed = Some(now_rfc3339());
        });
        self.status.transition(Status::Indexed);
        Ok(())
    }

    /// Drains the queue in `DRAIN_BATCH_SIZE` chunks, updating the hash
    /// cache and progress after each batch. Re-entrant calls (e.g. a
    /// file-watch event arriving mid-drain) are no-ops; the in-progress
    /// drain observes newly queued items through the shared queue.
    async fn drain_queue(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        loop {
            let batch = {
                let mut queue = self.queue.lock().unwrap();
                queue.next_batch(DRAIN_BATCH_SIZE)
            };
            if batch.is_empty() {
                break;
            }
            let files: Vec<String> = batch.iter().map(|t| t.file.clone()).collect();
            let result = self.processor.process_batch(files).await;

            {
                let mut queue = self.queue.lock().unwrap();
                let mut cache = self.hash_cache.lock().unwrap();
                for task in &batch {
                    let failed = result.errors.iter().find(|(f, _)| f == &task.file);
                    if let Some((_, error)) = failed {
                        if let Some(dropped) = queue.fail(&task.file, error.clone(), now_ms()) {
                            self.status.push_error(format!(
                                "dropped {} after exhausting retries: {}",
                                dropped.task.file, dropped.error
                            ));
                        }
                    } else {
                        queue.complete(&task.file);
                        let full_path = self.abs_path(&task.file).to_string_lossy().into_owned();
                        if let Ok(stamp) = FileStamp::for_path(&self.abs_path(&task.file)) {
                            cache.update(full_path, stamp);
                        }
                    }
                }
            }

            let queue_size = self.queue.lock().unwrap().size();
            self.status.update(|s| {
                s.progress.files_processed += result.successful + result.failed;
                s.queue_size = queue_size;
            });

            tokio::time::sleep(DRAIN_PAUSE).await;
        }

        self.draining.store(false, Ordering::SeqCst);
    }

    /// §4.10 `handle_change`: enqueue a created/modified file with elevated
    /// priority and trigger a drain, or delete a removed file's points.
    pub async fn handle_change(self: &Arc<Self>, event: WatchEvent) -> Result<()> {
        let rel_path = event
            .path
            .strip_prefix(&self.root)
            .unwrap_or(&event.path)
            .to_string_lossy()
            .replace('\\', "/");

        match event.kind {
            WatchEventKind::Created | WatchEventKind::Modified => {
                let reason = if event.kind == WatchEventKind::Created {
                    TaskReason::Created
                } else {
                    TaskReason::Modified
                };
                {
                    let mut queue = self.queue.lock().unwrap();
                    queue.add(rel_path, 2, reason, now_ms());
                    self.status.update(|s| s.queue_size = queue.size());
                }
                let me = Arc::clone(self);
                tokio::spawn(async move {
                    me.drain_queue().await;
                });
            }
            WatchEventKind::Removed => {
                if let Err(e) = self.processor.delete_file(&rel_path).await {
                    self.status.push_error(format!("failed to delete {rel_path}: {e}"));
                }
                self.hash_cache
                    .lock()
                    .unwrap()
                    .remove(&self.abs_path(&rel_path).to_string_lossy());
            }
        }
        Ok(())
    }

    /// §4.10 `handle_branch_change`: record the new branch and trigger a
    /// non-forced reindex so content unique to the new branch gets picked up.
    pub async fn handle_branch_change(self: &Arc<Self>, old: Option<String>, new: String) {
        info!(from = ?old, to = %new, "branch changed");
        self.status.update(|s| s.current_branch = Some(new));
        if self.status.snapshot().is_running {
            return;
        }
        let me = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = me.index_all(IndexOptions::default()).await {
                error!(error = %e, "branch-triggered reindex failed");
            }
        });
    }

    /// Stop the watchers and let any in-flight drain finish on its own.
    pub async fn stop(&self) {
        if let Some(w) = self.branch_watcher.lock().unwrap().take() {
            w.stop();
        }
        *self.file_watcher.lock().unwrap() = None;
        self.status.update(|s| s.is_watching = false);
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Top-level composition root: owns the active configuration and the
/// current `IndexerOrchestrator`, and serializes `reconfigure` so a
/// candidate configuration is health-checked before it replaces the live
/// one.
///
/// Grounded on `PrismServer::new`'s startup sequence (build collaborators,
/// validate connectivity, only then wire them into the server state) and on
/// `ConfigLoader`'s layered-merge discipline for how overrides apply.
pub struct Orchestrator {
    workspace_root: PathBuf,
    config: Mutex<SemindexConfig>,
    indexer: Mutex<Arc<IndexerOrchestrator>>,
    status: Arc<StatusManager>,
    reconfigure_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub async fn new(workspace_root: PathBuf, config: SemindexConfig) -> Result<Self> {
        config.validate().map_err(McpError::Config)?;
        let status = Arc::new(StatusManager::new());
        let indexer = Arc::new(build_indexer(&workspace_root, &config, Arc::clone(&status)).await?);
        indexer.initialize().await?;

        let orchestrator = Self {
            workspace_root,
            config: Mutex::new(config.clone()),
            indexer: Mutex::new(Arc::clone(&indexer)),
            status,
            reconfigure_lock: tokio::sync::Mutex::new(()),
        };

        if config.indexing.auto_index {
            let indexer = Arc::clone(&indexer);
            tokio::spawn(async move {
                if let Err(e) = indexer.index_all(IndexOptions::default()).await {
                    error!(error = %e, "initial index_all failed");
                }
            });
        }

        Ok(orchestrator)
    }

    pub fn status(&self) -> Arc<StatusManager> {
        Arc::clone(&self.status)
    }

    pub fn indexer(&self) -> Arc<IndexerOrchestrator> {
        Arc::clone(&self.indexer.lock().unwrap())
    }

    pub fn config(&self) -> SemindexConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        &self.workspace_root
    }

    /// Apply `overrides` to a copy of the live config, validate it, build
    /// and health-check a fresh `IndexerOrchestrator` from it, and only then
    /// swap it in and stop the old one. A rejected candidate leaves the live
    /// indexer and config completely untouched.
    pub async fn reconfigure(&self, overrides: ConfigOverrides) -> Result<()> {
        let _guard = self.reconfigure_lock.lock().await;

        let mut candidate = self.config();
        candidate.apply_overrides(&overrides);
        candidate
            .validate()
            .map_err(|e| McpError::ReconfigureRejected(e.to_string()))?;

        let new_indexer = Arc::new(
            build_indexer(&self.workspace_root, &candidate, Arc::clone(&self.status))
                .await
                .map_err(|e| McpError::ReconfigureRejected(e.to_string()))?,
        );
        new_indexer
            .initialize()
            .await
            .map_err(|e| McpError::ReconfigureRejected(e.to_string()))?;

        let old = {
            let mut guard = self.indexer.lock().unwrap();
            let old = Arc::clone(&guard);
            *guard = Arc::clone(&new_indexer);
            old
        };
        old.stop().await;
        *self.config.lock().unwrap() = candidate;
        Ok(())
    }
}

async fn build_indexer(
    workspace_root: &std::path::Path,
    config: &SemindexConfig,
    status: Arc<StatusManager>,
) -> Result<IndexerOrchestrator> {
    let root = config.codebase_root(workspace_root);
    let embedder = build_embedder(&config.embedding).map_err(McpError::Search)?;
    let store_config = search_qdrant_config(&config.qdrant);
    let store = Arc::new(VectorStore::connect(store_config).await.map_err(McpError::Search)?);
    let parser: Arc<dyn CodeParser> = Arc::new(LineChunker::default());

    Ok(IndexerOrchestrator::new(
        root,
        store,
        embedder,
        parser,
        status,
        config.indexing.concurrency,
        semindex_search::DEFAULT_MAX_RETRIES,
        config.indexing.watch_files,
        config.indexing.watch_branches,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_options_default_is_not_forced() {
        assert!(!IndexOptions::default().force);
    }
}
