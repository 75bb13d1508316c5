//! Status Manager: owns the indexer's state machine and snapshot reads.
//!
//! Grounded on the teacher's `IndexStatus`/`IndexState` handling in
//! `codeprysm-mcp::server` (a single struct mutated under a lock, read out
//! as owned snapshots for tool responses) generalized to the state machine
//! and listener-notification contract spec.md §3/§5 require: single-writer,
//! snapshot reads, listener failures isolated from the transition itself.

use std::sync::Mutex;

use semindex_core::{IndexerState, Status};
use tracing::warn;

type Listener = Box<dyn Fn(&IndexerState) + Send + Sync>;

/// Tracks the indexer's `{standby, indexing, indexed, error}` state machine
/// plus progress/stats/error-ring, and notifies listeners after each
/// accepted transition.
pub struct StatusManager {
    state: Mutex<IndexerState>,
    listeners: Mutex<Vec<Listener>>,
}

impl Default for StatusManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IndexerState::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener invoked with a snapshot after every accepted
    /// transition. A panicking or slow listener never blocks other
    /// listeners or the caller beyond its own execution.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&IndexerState) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Current status snapshot, cheap to clone, safe to hold across I/O.
    pub fn snapshot(&self) -> IndexerState {
        self.state.lock().unwrap().clone()
    }

    /// Attempt `status -> next`. Returns false and leaves state untouched if
    /// the transition is not permitted by the state machine.
    pub fn transition(&self, next: Status) -> bool {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            if !state.progress.status.can_transition_to(next) {
                return false;
            }
            state.progress.status = next;
            state.clone()
        };
        self.notify(&snapshot);
        true
    }

    /// Mutate the state under the lock, then notify listeners with the
    /// resulting snapshot. Used for progress/stats updates that don't change
    /// `status` (and so aren't gated by the state machine).
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut IndexerState),
    {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            f(&mut state);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Push an error into the bounded ring and notify listeners.
    pub fn push_error(&self, message: impl Into<String>) {
        self.update(|state| state.push_error(message));
    }

    fn notify(&self, snapshot: &IndexerState) {
        for listener in self.listeners.lock().unwrap().iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(snapshot);
            }));
            if result.is_err() {
                warn!("status listener panicked; ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_initial_state_is_standby() {
        let mgr = StatusManager::new();
        assert_eq!(mgr.snapshot().progress.status, Status::Standby);
    }

    #[test]
    fn test_valid_transition_succeeds() {
        let mgr = StatusManager::new();
        assert!(mgr.transition(Status::Indexing));
        assert_eq!(mgr.snapshot().progress.status, Status::Indexing);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mgr = StatusManager::new();
        assert!(!mgr.transition(Status::Indexed));
        assert_eq!(mgr.snapshot().progress.status, Status::Standby);
    }

    #[test]
    fn test_listener_notified_on_transition() {
        let mgr = StatusManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        mgr.on_change(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        mgr.transition(Status::Indexing);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_abort_transition() {
        let mgr = StatusManager::new();
        mgr.on_change(|_| panic!("boom"));
        assert!(mgr.transition(Status::Indexing));
        assert_eq!(mgr.snapshot().progress.status, Status::Indexing);
    }

    #[test]
    fn test_error_ring_push() {
        let mgr = StatusManager::new();
        mgr.push_error("boom");
        assert_eq!(mgr.snapshot().errors.len(), 1);
    }
}
