//! File Watcher: recursive OS-level filesystem watching with debounced
//! change events, feeding the Indexing Queue.
//!
//! Grounded on `marlonsc-mcb::mcb-infrastructure::config::watcher::ConfigWatcher`:
//! a `RecommendedWatcher` built with a closure that captures
//! `tokio::runtime::Handle::current()` so the notify crate's own (non-async)
//! callback thread can hand events back into the async runtime. Generalized
//! here from watching one file to watching a whole directory tree, and from
//! an immediate reload to a debounce window that coalesces bursts of editor
//! saves into a single event per path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::Result;

/// The kind of change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// A debounced, coalesced file-change notification.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// Default debounce window: rapid successive writes to the same path within
/// this interval collapse into one event.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Watches a directory tree and emits debounced [`WatchEvent`]s on a channel.
/// Holds the underlying `RecommendedWatcher` alive for as long as the
/// `FileWatcher` itself lives; dropping it stops the watch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root` recursively. Returns the watcher (keep it alive)
    /// and a receiver of debounced events.
    pub fn watch(root: &Path, debounce: Duration) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Event>();
        let runtime_handle = Handle::current();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let tx = raw_tx.clone();
                    let handle = runtime_handle.clone();
                    handle.spawn(async move {
                        let _ = tx.send(event);
                    });
                } else if let Err(e) = res {
                    tracing::warn!(error = %e, "file watch error");
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        let (debounced_tx, debounced_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(raw_rx, debounced_tx, debounce));

        Ok((Self { _watcher: watcher }, debounced_rx))
    }
}

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Created),
        EventKind::Modify(_) => Some(WatchEventKind::Modified),
        EventKind::Remove(_) => Some(WatchEventKind::Removed),
        _ => None,
    }
}

/// Buffers raw notify events per-path and flushes a path's latest event once
/// `debounce` has elapsed since its last observed change, coalescing bursts
/// (e.g. editors that write-then-rename on every save) into one event.
async fn debounce_loop(
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    out_tx: mpsc::UnboundedSender<WatchEvent>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, (WatchEventKind, Instant)> = HashMap::new();
    let mut tick = tokio::time::interval(debounce.min(Duration::from_millis(50)).max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            maybe_event = raw_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if let Some(kind) = classify(&event.kind) {
                            for path in event.paths {
                                pending.insert(path, (kind, Instant::now()));
                            }
                        }
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                let now = Instant::now();
                let ready: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, seen))| now.duration_since(*seen) >= debounce)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in ready {
                    if let Some((kind, _)) = pending.remove(&path) {
                        if out_tx.send(WatchEvent { path, kind }).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_maps_notify_kinds() {
        assert_eq!(
            classify(&EventKind::Create(notify::event::CreateKind::File)),
            Some(WatchEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(notify::event::ModifyKind::Any)),
            Some(WatchEventKind::Modified)
        );
        assert_eq!(
            classify(&EventKind::Remove(notify::event::RemoveKind::File)),
            Some(WatchEventKind::Removed)
        );
        assert_eq!(classify(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[tokio::test]
    async fn test_debounce_coalesces_rapid_events() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(raw_rx, out_tx, Duration::from_millis(30)));

        let path = PathBuf::from("src/lib.rs");
        for _ in 0..5 {
            raw_tx
                .send(Event {
                    kind: EventKind::Modify(notify::event::ModifyKind::Any),
                    paths: vec![path.clone()],
                    attrs: Default::default(),
                })
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let event = tokio::time::timeout(Duration::from_millis(500), out_rx.recv())
            .await
            .expect("expected a debounced event")
            .expect("channel closed unexpectedly");
        assert_eq!(event.path, path);
        assert_eq!(event.kind, WatchEventKind::Modified);

        let second = tokio::time::timeout(Duration::from_millis(100), out_rx.recv()).await;
        assert!(second.is_err(), "expected no further coalesced events");
    }
}
