//! Path Segmenter: decomposes a repo-relative path into ordered, numbered
//! segments used as secondary keys for directory-prefix filtering in the
//! vector store payload (`pathSegments`).

use std::collections::HashMap;

/// Maximum number of leading path segments retained for prefix filtering.
/// Segments beyond this depth are dropped; the filename itself is always
/// included as the final retained segment if it falls within the budget.
pub const MAX_DEPTH: usize = 16;

/// An ordered decomposition of a path into directory/file segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathSegments(pub Vec<String>);

impl PathSegments {
    /// Decompose `path` into its normalized, ordered segments (up to
    /// `MAX_DEPTH`). Normalizes `\` to `/` and drops empty components
    /// produced by leading/trailing/duplicate separators.
    pub fn decompose(path: &str) -> Self {
        let normalized = path.replace('\\', "/");
        let segments: Vec<String> = normalized
            .split('/')
            .filter(|s| !s.is_empty())
            .take(MAX_DEPTH)
            .map(|s| s.to_string())
            .collect();
        Self(segments)
    }

    /// Numeric-string-keyed map, as stored in `payload.pathSegments`.
    pub fn into_map(self) -> HashMap<String, String> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i.to_string(), s))
            .collect()
    }

    /// Re-join segments with `/`, the normalized form of the original path
    /// (up to `MAX_DEPTH` segments).
    pub fn join(&self) -> String {
        self.0.join("/")
    }

    /// Whether these segments begin with the given prefix segments in order.
    pub fn starts_with(&self, prefix: &[String]) -> bool {
        if prefix.len() > self.0.len() {
            return false;
        }
        self.0[..prefix.len()] == prefix[..]
    }
}

/// Free-function form of [`PathSegments::decompose`].
pub fn decompose(path: &str) -> PathSegments {
    PathSegments::decompose(path)
}

/// Free-function form of [`PathSegments::join`].
pub fn join_segments(segments: &PathSegments) -> String {
    segments.join()
}

/// Split a `directory_prefix` search parameter (e.g. `"src/components"`)
/// into ordered segments, the same way a file path is decomposed.
pub fn directory_prefix_segments(prefix: &str) -> Vec<String> {
    PathSegments::decompose(prefix).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_join_decompose() {
        let path = "src/components/button.tsx";
        let segments = decompose(path);
        assert_eq!(join_segments(&segments), path);
    }

    #[test]
    fn test_roundtrip_normalizes_separators() {
        let path = r"src\components\button.tsx";
        let segments = decompose(path);
        assert_eq!(join_segments(&segments), "src/components/button.tsx");
    }

    #[test]
    fn test_roundtrip_drops_empty_components() {
        let path = "/src//components/button.tsx/";
        let segments = decompose(path);
        assert_eq!(join_segments(&segments), "src/components/button.tsx");
    }

    #[test]
    fn test_max_depth_truncation() {
        let deep = (0..20).map(|i| format!("d{i}")).collect::<Vec<_>>().join("/");
        let segments = decompose(&deep);
        assert_eq!(segments.0.len(), MAX_DEPTH);
    }

    #[test]
    fn test_into_map_numeric_keys() {
        let segments = decompose("src/components/button.tsx");
        let map = segments.into_map();
        assert_eq!(map.get("0").unwrap(), "src");
        assert_eq!(map.get("1").unwrap(), "components");
        assert_eq!(map.get("2").unwrap(), "button.tsx");
    }

    #[test]
    fn test_prefix_filter_matches_inside_prefix() {
        let prefix = directory_prefix_segments("src/components");
        let inside = decompose("src/components/button.tsx");
        assert!(inside.starts_with(&prefix));
    }

    #[test]
    fn test_prefix_filter_rejects_outside_prefix() {
        let prefix = directory_prefix_segments("src/components");
        let outside = decompose("src/utils/format.ts");
        assert!(!outside.starts_with(&prefix));
    }
}
