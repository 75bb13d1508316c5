//! Branch Watcher: polls the repository's current git branch and reports
//! switches so the orchestrator can trigger a non-forced reindex.
//!
//! Grounded on `builder.rs::extract_git_metadata`'s
//! `git rev-parse --abbrev-ref HEAD` shell-out for the branch read, and on
//! the MCP server's `auto_sync_task` for the poll-loop shape: a
//! `tokio::time::interval` combined with a `watch::Receiver<bool>` shutdown
//! signal checked via `tokio::select!`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;

/// Default poll interval for branch changes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Read the current branch name via `git rev-parse --abbrev-ref HEAD`.
/// Returns `None` if `root` isn't a git repository or the command fails.
pub fn current_branch(root: &Path) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() {
        None
    } else {
        Some(branch)
    }
}

/// Watches `root`'s current branch on a poll loop, invoking `on_change` with
/// `(old_branch, new_branch)` whenever it differs from the last observed
/// value. Runs until `stop()` is called (or the `BranchWatcher` is dropped,
/// which also stops it since the shutdown sender closes).
pub struct BranchWatcher {
    shutdown_tx: watch::Sender<bool>,
}

impl BranchWatcher {
    /// Start watching. `on_change` runs on the background task; keep it
    /// cheap or spawn further work from inside it.
    pub fn start<F>(root: PathBuf, interval: Duration, mut on_change: F) -> Self
    where
        F: FnMut(Option<String>, String) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            let mut last = current_branch(&root);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let observed = current_branch(&root);
                        if let Some(new_branch) = &observed {
                            if last.as_deref() != Some(new_branch.as_str()) {
                                on_change(last.clone(), new_branch.clone());
                                last = observed;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown_tx }
    }

    /// Stop the background poll loop cleanly.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::sync::{Arc, Mutex};

    fn init_repo(dir: &Path) {
        Command::new("git").arg("init").current_dir(dir).output().unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@test.com"])
            .current_dir(dir)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "test"])
            .current_dir(dir)
            .output()
            .unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    #[test]
    fn test_current_branch_none_outside_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(current_branch(dir.path()), None);
    }

    #[test]
    fn test_current_branch_reads_head() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let branch = current_branch(dir.path());
        assert!(branch.is_some());
    }

    #[tokio::test]
    async fn test_watcher_reports_branch_switch() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let initial = current_branch(dir.path()).unwrap();

        Command::new("git")
            .args(["checkout", "-b", "feature/x"])
            .current_dir(dir.path())
            .output()
            .unwrap();

        let events: Arc<Mutex<Vec<(Option<String>, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let watcher = BranchWatcher::start(
            dir.path().to_path_buf(),
            Duration::from_millis(20),
            move |old, new| events_clone.lock().unwrap().push((old, new)),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        watcher.stop();

        let seen = events.lock().unwrap();
        assert!(seen.iter().any(|(old, new)| old.as_deref() == Some(initial.as_str())
            && new == "feature/x"));
    }
}
