//! Indexing Queue: a priority queue with an explicit in-flight set, retry
//! bookkeeping, and reason tags.
//!
//! No direct teacher analog — the teacher drives indexing straight off
//! discovery results with no queue of its own — so this follows the general
//! style the core crate uses for its own small, dependency-free structures
//! (`hash_cache.rs`, `filter.rs`): a plain struct over standard collections,
//! no external queue crate. Sort order is dictated by
//! `semindex_core::IndexingTask`'s own doc comment: priority descending,
//! `added_at` ascending; retried tasks sink to `priority = -1` so fresh work
//! is always tried before a task that has already failed at least once.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use semindex_core::model::TaskReason;
use semindex_core::IndexingTask;

/// Re-enqueue limit before a failing task is dropped to the error ring.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
struct QueuedTask(IndexingTask);

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.added_at == other.0.added_at
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority, then earlier added_at, pops first.
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.added_at.cmp(&self.0.added_at))
    }
}

/// Snapshot of queue occupancy, returned by `stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub waiting: usize,
    pub in_flight: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_dropped: u64,
}

/// A task that exhausted its retries; the caller surfaces this to the
/// status error ring.
#[derive(Debug, Clone)]
pub struct DroppedTask {
    pub task: IndexingTask,
    pub error: String,
}

pub struct IndexingQueue {
    heap: BinaryHeap<QueuedTask>,
    waiting: HashSet<String>,
    in_flight: HashMap<String, IndexingTask>,
    max_retries: u32,
    stats: QueueStats,
}

impl Default for IndexingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl IndexingQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            heap: BinaryHeap::new(),
            waiting: HashSet::new(),
            in_flight: HashMap::new(),
            max_retries,
            stats: QueueStats::default(),
        }
    }

    /// Enqueue one task. A no-op if `file` is already waiting or in-flight.
    pub fn add(&mut self, file: impl Into<String>, priority: i64, reason: TaskReason, added_at: u64) {
        let file = file.into();
        if self.waiting.contains(&file) || self.in_flight.contains_key(&file) {
            return;
        }
        self.waiting.insert(file.clone());
        self.heap.push(QueuedTask(IndexingTask::new(file, priority, reason, added_at)));
    }

    pub fn add_batch(&mut self, tasks: impl IntoIterator<Item = (String, i64, TaskReason, u64)>) {
        for (file, priority, reason, added_at) in tasks {
            self.add(file, priority, reason, added_at);
        }
    }

    /// Move the highest-priority waiting task to in-flight.
    pub fn next(&mut self) -> Option<IndexingTask> {
        let queued = self.heap.pop()?;
        self.waiting.remove(&queued.0.file);
        self.in_flight.insert(queued.0.file.clone(), queued.0.clone());
        Some(queued.0)
    }

    /// Move up to `n` waiting tasks to in-flight, highest priority first.
    pub fn next_batch(&mut self, n: usize) -> Vec<IndexingTask> {
        let mut tasks = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next() {
                Some(task) => tasks.push(task),
                None => break,
            }
        }
        tasks
    }

    /// Mark a task as successfully processed, removing it from in-flight.
    pub fn complete(&mut self, file: &str) {
        if self.in_flight.remove(file).is_some() {
            self.stats.total_completed += 1;
        }
    }

    /// Mark a task as failed. Re-enqueues with `priority = -1` and
    /// `retries += 1` if under `max_retries`; otherwise drops it and returns
    /// the dropped task for the caller to surface to the error ring.
    pub fn fail(&mut self, file: &str, error: impl Into<String>, added_at: u64) -> Option<DroppedTask> {
        let Some(mut task) = self.in_flight.remove(file) else {
            return None;
        };
        self.stats.total_failed += 1;

        if task.retries < self.max_retries {
            task.retries += 1;
            task.priority = -1;
            task.added_at = added_at;
            self.waiting.insert(task.file.clone());
            self.heap.push(QueuedTask(task));
            None
        } else {
            self.stats.total_dropped += 1;
            Some(DroppedTask {
                task,
                error: error.into(),
            })
        }
    }

    pub fn has(&self, file: &str) -> bool {
        self.waiting.contains(file) || self.in_flight.contains_key(file)
    }

    pub fn is_processing(&self, file: &str) -> bool {
        self.in_flight.contains_key(file)
    }

    /// Total of waiting + in-flight tasks.
    pub fn size(&self) -> usize {
        self.waiting.len() + self.in_flight.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.waiting.clear();
        self.in_flight.clear();
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            waiting: self.waiting.len(),
            in_flight: self.in_flight.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_descending_then_added_at_ascending() {
        let mut q = IndexingQueue::default();
        q.add("low.rs", 1, TaskReason::Modified, 0);
        q.add("high.rs", 10, TaskReason::Modified, 1);
        q.add("mid.rs", 5, TaskReason::Modified, 2);
        q.add("mid2.rs", 5, TaskReason::Modified, 1);

        assert_eq!(q.next().unwrap().file, "high.rs");
        assert_eq!(q.next().unwrap().file, "mid2.rs");
        assert_eq!(q.next().unwrap().file, "mid.rs");
        assert_eq!(q.next().unwrap().file, "low.rs");
        assert!(q.next().is_none());
    }

    #[test]
    fn test_add_is_noop_while_waiting_or_in_flight() {
        let mut q = IndexingQueue::default();
        q.add("a.rs", 1, TaskReason::Modified, 0);
        q.add("a.rs", 99, TaskReason::Modified, 5);
        assert_eq!(q.size(), 1);

        let task = q.next().unwrap();
        assert_eq!(task.priority, 1);
        q.add("a.rs", 50, TaskReason::Modified, 10);
        assert_eq!(q.size(), 1);
        assert!(q.is_processing("a.rs"));
    }

    #[test]
    fn test_complete_removes_from_in_flight() {
        let mut q = IndexingQueue::default();
        q.add("a.rs", 1, TaskReason::Initial, 0);
        q.next();
        assert!(q.is_processing("a.rs"));
        q.complete("a.rs");
        assert!(!q.has("a.rs"));
        assert_eq!(q.stats().total_completed, 1);
    }

    #[test]
    fn test_fail_requeues_with_sunk_priority_until_max_retries() {
        let mut q = IndexingQueue::new(2);
        q.add("a.rs", 5, TaskReason::Modified, 0);

        q.next();
        assert!(q.fail("a.rs", "boom", 1).is_none());
        let requeued = q.next().unwrap();
        assert_eq!(requeued.priority, -1);
        assert_eq!(requeued.retries, 1);

        assert!(q.fail("a.rs", "boom again", 2).is_none());
        let requeued = q.next().unwrap();
        assert_eq!(requeued.retries, 2);

        let dropped = q.fail("a.rs", "final failure", 3).expect("should drop");
        assert_eq!(dropped.error, "final failure");
        assert!(!q.has("a.rs"));
        assert_eq!(q.stats().total_dropped, 1);
    }

    #[test]
    fn test_clear_empties_all_state() {
        let mut q = IndexingQueue::default();
        q.add("a.rs", 1, TaskReason::Initial, 0);
        q.add("b.rs", 1, TaskReason::Initial, 1);
        q.next();
        q.clear();
        assert_eq!(q.size(), 0);
        assert!(!q.has("a.rs"));
        assert!(!q.has("b.rs"));
    }

    #[test]
    fn test_next_batch_caps_at_available_tasks() {
        let mut q = IndexingQueue::default();
        q.add("a.rs", 1, TaskReason::Initial, 0);
        q.add("b.rs", 1, TaskReason::Initial, 1);
        let batch = q.next_batch(5);
        assert_eq!(batch.len(), 2);
        assert_eq!(q.stats().in_flight, 2);
    }
}
