//! File Filter: a hand-rolled gitignore-dialect matcher.
//!
//! Discovery needs ignore-file semantics independent of the `ignore` crate's
//! own notion of "project root" so that `.mcpignore` files found at any
//! depth compose the same way `.gitignore` does. Patterns are evaluated
//! last-match-wins, in file order, mirroring git's documented behavior.

use std::path::Path;

/// One compiled ignore pattern.
#[derive(Debug, Clone)]
struct Pattern {
    /// Negated with a leading `!`.
    negated: bool,
    /// Anchored to the root of the ignore file's directory (leading `/`).
    anchored: bool,
    /// Directory-only match (trailing `/`).
    dir_only: bool,
    /// The glob body, with anchoring/negation/dir-only markers stripped.
    glob: String,
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Consume an optional following '/' so `**/` matches
                    // zero or more directory levels.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '[' => {
                out.push('[');
            }
            ']' => {
                out.push(']');
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

impl Pattern {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let mut rest = trimmed;
        let negated = if let Some(stripped) = rest.strip_prefix('!') {
            rest = stripped;
            true
        } else {
            false
        };
        let anchored = rest.starts_with('/');
        if anchored {
            rest = &rest[1..];
        }
        let dir_only = rest.ends_with('/') && rest.len() > 1;
        if dir_only {
            rest = &rest[..rest.len() - 1];
        }
        if rest.is_empty() {
            return None;
        }
        Some(Self {
            negated,
            anchored,
            dir_only,
            glob: rest.to_string(),
        })
    }

    /// Whether this pattern matches the given repo-relative path
    /// (forward-slash separated, no leading slash).
    fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            // A directory-only pattern can still match an ancestor
            // directory of a file; callers check ancestors separately.
            return false;
        }
        let regex_src = glob_to_regex(&self.glob);
        let re = match regex::Regex::new(&regex_src) {
            Ok(re) => re,
            Err(_) => return false,
        };
        if self.anchored {
            re.is_match(rel_path)
        } else {
            // Unanchored patterns may match at any path component boundary.
            re.is_match(rel_path)
                || rel_path
                    .rsplit_once('/')
                    .map(|(_, tail)| re.is_match(tail))
                    .unwrap_or(false)
                || rel_path.split('/').any(|seg| re.is_match(seg))
        }
    }
}

/// A compiled set of ignore patterns, evaluated last-match-wins.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    patterns: Vec<Pattern>,
}

impl FileFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and append patterns from an ignore file's contents (e.g. the
    /// contents of a `.gitignore` or `.mcpignore`).
    pub fn add_patterns(&mut self, contents: &str) {
        for line in contents.lines() {
            if let Some(p) = Pattern::parse(line) {
                self.patterns.push(p);
            }
        }
    }

    /// Load patterns from a file on disk, if it exists. Missing files are
    /// silently treated as contributing no patterns.
    pub fn load_patterns(&mut self, path: &Path) -> std::io::Result<()> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                self.add_patterns(&contents);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn add_pattern(&mut self, line: &str) {
        if let Some(p) = Pattern::parse(line) {
            self.patterns.push(p);
        }
    }

    /// Whether `rel_path` (forward-slash, repo-relative, no leading slash)
    /// should be ignored. `.git` is always ignored regardless of patterns.
    /// Evaluates patterns in order; the last matching pattern wins, so a
    /// later `!pattern` can re-include a path an earlier pattern excluded.
    pub fn should_ignore(&self, rel_path: &str, is_dir: bool) -> bool {
        if rel_path == ".git" || rel_path.starts_with(".git/") {
            return true;
        }
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(rel_path, is_dir) {
                ignored = !pattern.negated;
            } else if pattern.dir_only && is_dir_ancestor_match(pattern, rel_path) {
                ignored = !pattern.negated;
            }
        }
        ignored
    }

    /// Directory-name check used by the directory walker to prune descent
    /// without needing the full relative path (e.g. `node_modules`, `dist`).
    pub fn should_skip_dir(&self, dir_name: &str) -> bool {
        if dir_name == ".git" {
            return true;
        }
        self.should_ignore(dir_name, true)
    }
}

fn is_dir_ancestor_match(pattern: &Pattern, rel_path: &str) -> bool {
    // A dir-only pattern like `dist/` also excludes everything under it;
    // this checks whether any ancestor directory component matches.
    let mut prefix = String::new();
    for (i, seg) in rel_path.split('/').enumerate() {
        if i > 0 {
            prefix.push('/');
        }
        prefix.push_str(seg);
        if pattern.matches(&prefix, true) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_s1() {
        // S1: files a.ts, b.ts, c.test.ts, dist/x.js; .gitignore contains
        // `dist/` and `*.test.*`. Discovery yields exactly [a.ts, b.ts].
        let mut filter = FileFilter::new();
        filter.add_patterns("dist/\n*.test.*\n");

        assert!(!filter.should_ignore("a.ts", false));
        assert!(!filter.should_ignore("b.ts", false));
        assert!(filter.should_ignore("c.test.ts", false));
        assert!(filter.should_ignore("dist/x.js", false));
        assert!(filter.should_ignore("dist", true));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let mut filter = FileFilter::new();
        filter.add_patterns("# comment\n\n*.log\n");
        assert!(filter.should_ignore("debug.log", false));
        assert!(!filter.should_ignore("README.md", false));
    }

    #[test]
    fn test_negation_reincludes() {
        let mut filter = FileFilter::new();
        filter.add_patterns("*.log\n!important.log\n");
        assert!(filter.should_ignore("debug.log", false));
        assert!(!filter.should_ignore("important.log", false));
    }

    #[test]
    fn test_root_anchored_pattern() {
        let mut filter = FileFilter::new();
        filter.add_patterns("/build\n");
        assert!(filter.should_ignore("build", true));
        assert!(!filter.should_ignore("src/build", true));
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        let mut filter = FileFilter::new();
        filter.add_patterns("**/generated/**\n");
        assert!(filter.should_ignore("src/generated/foo.rs", false));
    }

    #[test]
    fn test_git_always_ignored() {
        let filter = FileFilter::new();
        assert!(filter.should_ignore(".git", true));
        assert!(filter.should_ignore(".git/HEAD", false));
    }

    #[test]
    fn test_last_match_wins_order_matters() {
        let mut filter = FileFilter::new();
        filter.add_patterns("!keep.ts\n*.ts\n");
        // *.ts comes after !keep.ts, so it wins: keep.ts ends up ignored.
        assert!(filter.should_ignore("keep.ts", false));
    }
}
