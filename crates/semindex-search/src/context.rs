//! Context Extractor: reads source lines around a hit and formats them with
//! an optional line-number gutter.
//!
//! No direct teacher analog; reads the file fresh rather than caching it,
//! following the same "degrade to the original value on a local I/O error,
//! log it, keep going" posture the core crate's `FileHashCache` and
//! `discovery.rs` use for their own filesystem reads.

use std::path::Path;

use tracing::warn;

/// Defaults per the contract: 3 lines of context on either side of the hit.
pub const DEFAULT_LINES_BEFORE: usize = 3;
pub const DEFAULT_LINES_AFTER: usize = 3;

/// Reads `base/file`, slices `[line - lines_before, line + lines_after)`
/// bounded by file length, and renders it as plain text or with a
/// `"{marker} {lineno:>4} | {line}"` gutter (`>` on the hit line, ` `
/// otherwise). `line` is 1-based. Returns `None` (logging the error) if the
/// file cannot be read — the caller then falls back to the hit's stored
/// `code` unchanged.
pub fn extract(
    base: &Path,
    file: &str,
    line: u32,
    lines_before: usize,
    lines_after: usize,
    with_gutter: bool,
) -> Option<String> {
    let path = base.join(file);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %file, error = %e, "context extraction: failed to read file");
            return None;
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let line_idx = line.saturating_sub(1) as usize;
    let start = line_idx.saturating_sub(lines_before);
    let end = (line_idx + lines_after + 1).min(lines.len());
    if start >= end {
        return None;
    }

    let mut out = String::new();
    for (offset, text) in lines[start..end].iter().enumerate() {
        let lineno = start + offset + 1;
        if with_gutter {
            let marker = if lineno == line as usize { '>' } else { ' ' };
            out.push_str(&format!("{marker} {lineno:>4} | {text}\n"));
        } else {
            out.push_str(text);
            out.push('\n');
        }
    }
    out.pop();
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_extract_slices_bounded_window_with_gutter() {
        let dir = tempdir().unwrap();
        let content = (1..=10).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        write_file(dir.path(), "a.rs", &content);

        let result = extract(dir.path(), "a.rs", 5, 2, 2, true).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 5); // lines 3..=7
        assert!(lines[2].starts_with('>'));
        assert!(lines[0].starts_with(' '));
        assert!(lines[2].contains("line5"));
    }

    #[test]
    fn test_extract_bounds_window_at_file_edges() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.rs", "line1\nline2\nline3");

        let result = extract(dir.path(), "a.rs", 1, 3, 3, false).unwrap();
        assert_eq!(result, "line1\nline2\nline3");
    }

    #[test]
    fn test_extract_returns_none_on_missing_file() {
        let dir = tempdir().unwrap();
        assert!(extract(dir.path(), "missing.rs", 1, 3, 3, true).is_none());
    }
}
