//! Parallel Discovery: walks a repository and yields an ordered sequence of
//! repo-relative file paths eligible for indexing.
//!
//! Directory reads fan out with a bounded concurrency cap so a single slow
//! or unreadable directory (network filesystem, permission error) does not
//! stall the whole walk; a read error is recorded and the walk continues.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::filter::FileFilter;
use crate::parser::SupportedLanguage;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),
    #[error("root path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Default set of directory names skipped regardless of ignore-file content.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".venv",
    "venv",
    "__pycache__",
    ".next",
    ".cache",
];

/// Default directory-read fan-out concurrency.
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Directory names to skip entirely, in addition to `.git`.
    pub exclude_dirs: HashSet<String>,
    /// Maximum number of directories read concurrently.
    pub concurrency: usize,
    /// Whether to honor `.gitignore`/`.mcpignore` files found while walking.
    pub respect_ignore_files: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            concurrency: DEFAULT_CONCURRENCY,
            respect_ignore_files: true,
        }
    }
}

/// A single discovered file, with its path relative to the discovery root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the root, forward-slash separated.
    pub rel_path: String,
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Recognized language tag, if the extension is known.
    pub language: Option<&'static str>,
}

#[derive(Default)]
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Walk `root` and return an ordered (by path) sequence of discovered
    /// files with a known source-language extension. Ignore-file patterns
    /// compose across directory levels: a filter inherited from a parent
    /// is extended (never replaced) by any `.gitignore`/`.mcpignore` found
    /// in a subdirectory.
    pub async fn discover(&self, root: &Path) -> Result<Vec<DiscoveredFile>> {
        if !root.exists() {
            return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .unwrap_or_else(|_| root.to_path_buf());

        let base_filter = FileFilter::new();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut files = self
            .walk_dir(&root, &root, base_filter, semaphore)
            .await;
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(files)
    }

    fn walk_dir<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        inherited_filter: FileFilter,
        semaphore: Arc<Semaphore>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<DiscoveredFile>> + Send + 'a>>
    {
        Box::pin(async move {
            let _permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return Vec::new(),
            };

            let mut filter = inherited_filter;
            if self.config.respect_ignore_files {
                if let Err(e) = filter.load_patterns(&dir.join(".gitignore")) {
                    warn!(dir = %dir.display(), error = %e, "failed reading .gitignore");
                }
                if let Err(e) = filter.load_patterns(&dir.join(".mcpignore")) {
                    warn!(dir = %dir.display(), error = %e, "failed reading .mcpignore");
                }
            }

            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                    return Vec::new();
                }
            };

            let mut subdirs = Vec::new();
            let mut files = Vec::new();

            for entry in entries {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                let file_type = match entry.file_type() {
                    Ok(ft) => ft,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping entry with unreadable file type");
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if self.config.exclude_dirs.contains(&name) || filter.should_skip_dir(&name) {
                        continue;
                    }
                    subdirs.push(path);
                } else if file_type.is_file() {
                    let rel_path = match path.strip_prefix(root) {
                        Ok(p) => p.to_string_lossy().replace('\\', "/"),
                        Err(_) => continue,
                    };
                    if filter.should_ignore(&rel_path, false) {
                        continue;
                    }
                    let language = SupportedLanguage::from_path(&path).map(|l| l.tag());
                    if language.is_none() {
                        continue;
                    }
                    files.push(DiscoveredFile {
                        rel_path,
                        abs_path: path,
                        language,
                    });
                }
            }

            drop(_permit);

            let mut handles = Vec::new();
            for subdir in subdirs {
                let filter = filter.clone();
                let semaphore = semaphore.clone();
                handles.push(self.walk_dir(root, &subdir, filter, semaphore));
            }
            for fut in handles {
                files.extend(fut.await);
            }

            files
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_scenario_s1_discovery_yields_expected_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export const a = 1;");
        write_file(dir.path(), "b.ts", "export const b = 2;");
        write_file(dir.path(), "c.test.ts", "test('x', () => {});");
        write_file(dir.path(), "dist/x.js", "console.log(1);");
        write_file(dir.path(), ".gitignore", "dist/\n*.test.*\n");

        let discovery = Discovery::new(DiscoveryConfig::default());
        let files = discovery.discover(dir.path()).await.unwrap();
        let rel_paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();

        assert_eq!(rel_paths, vec!["a.ts", "b.ts"]);
    }

    #[tokio::test]
    async fn test_excludes_default_directories() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "src/main.rs", "fn main() {}");
        write_file(dir.path(), "node_modules/pkg/index.js", "module.exports = {};");

        let discovery = Discovery::new(DiscoveryConfig::default());
        let files = discovery.discover(dir.path()).await.unwrap();
        let rel_paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();

        assert_eq!(rel_paths, vec!["src/main.rs"]);
    }

    #[tokio::test]
    async fn test_unknown_extension_excluded() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "notes.txt", "just notes");
        write_file(dir.path(), "main.rs", "fn main() {}");

        let discovery = Discovery::new(DiscoveryConfig::default());
        let files = discovery.discover(dir.path()).await.unwrap();
        let rel_paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();

        assert_eq!(rel_paths, vec!["main.rs"]);
    }

    #[tokio::test]
    async fn test_missing_root_errors() {
        let discovery = Discovery::new(DiscoveryConfig::default());
        let result = discovery.discover(Path::new("/nonexistent/path/xyz")).await;
        assert!(matches!(result, Err(DiscoveryError::RootNotFound(_))));
    }

    #[tokio::test]
    async fn test_nested_gitignore_composes_with_parent() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), ".gitignore", "*.log\n");
        write_file(dir.path(), "pkg/.gitignore", "*.tmp\n");
        write_file(dir.path(), "pkg/keep.rs", "fn x() {}");
        write_file(dir.path(), "pkg/debug.log", "log line");
        write_file(dir.path(), "pkg/scratch.tmp", "not real code");

        let discovery = Discovery::new(DiscoveryConfig::default());
        let files = discovery.discover(dir.path()).await.unwrap();
        let rel_paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();

        assert_eq!(rel_paths, vec!["pkg/keep.rs"]);
    }
}
