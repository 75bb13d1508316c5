//! Language detection and code-to-block parsing.
//!
//! `SupportedLanguage` is the extension-to-tag source of truth used by
//! discovery (to decide whether a file is eligible at all) and by the
//! enricher (to populate the `language` facet). `CodeParser` is the seam a
//! real per-language extractor would implement; `LineChunker` is the
//! fallback that keeps the pipeline runnable for every recognized language
//! without one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::model::{BlockType, CodeBlock};

/// Supported programming languages, identified by their extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    C,
    Cpp,
    CSharp,
    Java,
    Ruby,
}

impl SupportedLanguage {
    /// The language tag stored in block metadata and vector payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "python",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::TypeScript => "typescript",
            SupportedLanguage::Tsx => "typescript",
            SupportedLanguage::Rust => "rust",
            SupportedLanguage::Go => "go",
            SupportedLanguage::C => "c",
            SupportedLanguage::Cpp => "cpp",
            SupportedLanguage::CSharp => "csharp",
            SupportedLanguage::Java => "java",
            SupportedLanguage::Ruby => "ruby",
        }
    }

    /// Detect a language from a lowercase extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        extension_map().get(ext.to_lowercase().as_str()).copied()
    }

    /// Detect a language from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// All recognized extensions, used to build the discovery allow-list.
    pub fn all_extensions() -> &'static [&'static str] {
        &[
            "py", "js", "mjs", "cjs", "ts", "tsx", "rs", "go", "c", "h", "cpp", "hpp", "cc", "cxx",
            "cs", "java", "rb",
        ]
    }
}

impl std::fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

static EXTENSION_MAP: OnceLock<HashMap<&'static str, SupportedLanguage>> = OnceLock::new();

fn extension_map() -> &'static HashMap<&'static str, SupportedLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("py", SupportedLanguage::Python);
        map.insert("js", SupportedLanguage::JavaScript);
        map.insert("mjs", SupportedLanguage::JavaScript);
        map.insert("cjs", SupportedLanguage::JavaScript);
        map.insert("ts", SupportedLanguage::TypeScript);
        map.insert("tsx", SupportedLanguage::Tsx);
        map.insert("rs", SupportedLanguage::Rust);
        map.insert("go", SupportedLanguage::Go);
        map.insert("c", SupportedLanguage::C);
        map.insert("h", SupportedLanguage::C);
        map.insert("cpp", SupportedLanguage::Cpp);
        map.insert("hpp", SupportedLanguage::Cpp);
        map.insert("cc", SupportedLanguage::Cpp);
        map.insert("cxx", SupportedLanguage::Cpp);
        map.insert("cs", SupportedLanguage::CSharp);
        map.insert("java", SupportedLanguage::Java);
        map.insert("rb", SupportedLanguage::Ruby);
        map
    })
}

/// Implemented by anything that turns a file's source into `CodeBlock`s.
/// A real implementation would extract functions/classes/etc. at semantic
/// boundaries; `LineChunker` is the line-count-based fallback.
pub trait CodeParser: Send + Sync {
    /// Parse `source` (the contents of `rel_path`) into blocks.
    fn parse(&self, rel_path: &str, language: SupportedLanguage, source: &str) -> Vec<CodeBlock>;
}

/// Target number of lines per chunk when no semantic parser is available.
pub const DEFAULT_CHUNK_LINES: usize = 60;

/// Splits a file into fixed-size, non-overlapping line ranges. Used for any
/// recognized language without a dedicated semantic parser, and as the
/// baseline every real parser is measured against.
#[derive(Debug, Clone)]
pub struct LineChunker {
    pub chunk_lines: usize,
}

impl Default for LineChunker {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
        }
    }
}

impl CodeParser for LineChunker {
    fn parse(&self, rel_path: &str, language: SupportedLanguage, source: &str) -> Vec<CodeBlock> {
        let lines: Vec<&str> = source.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let chunk_lines = self.chunk_lines.max(1);
        let mut blocks = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = (start + chunk_lines).min(lines.len());
            let code = lines[start..end].join("\n");
            blocks.push(CodeBlock::new(
                rel_path.to_string(),
                (start + 1) as u32,
                end as u32,
                code,
                BlockType::Chunk,
                None,
                language.tag(),
            ));
            start = end;
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(
            SupportedLanguage::from_extension("py"),
            Some(SupportedLanguage::Python)
        );
        assert_eq!(
            SupportedLanguage::from_extension("TSX"),
            Some(SupportedLanguage::Tsx)
        );
        assert_eq!(SupportedLanguage::from_extension("unknown"), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            SupportedLanguage::from_path(Path::new("src/main.rs")),
            Some(SupportedLanguage::Rust)
        );
        assert_eq!(SupportedLanguage::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn test_line_chunker_splits_into_fixed_ranges() {
        let chunker = LineChunker { chunk_lines: 2 };
        let source = "a\nb\nc\nd\ne";
        let blocks = chunker.parse("file.rs", SupportedLanguage::Rust, source);
        assert_eq!(blocks.len(), 3);
        assert_eq!((blocks[0].line, blocks[0].end_line), (1, 2));
        assert_eq!((blocks[1].line, blocks[1].end_line), (3, 4));
        assert_eq!((blocks[2].line, blocks[2].end_line), (5, 5));
    }

    #[test]
    fn test_line_chunker_empty_source() {
        let chunker = LineChunker::default();
        let blocks = chunker.parse("empty.rs", SupportedLanguage::Rust, "");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_line_chunker_sets_language() {
        let chunker = LineChunker { chunk_lines: 10 };
        let blocks = chunker.parse("file.py", SupportedLanguage::Python, "x = 1");
        assert_eq!(blocks[0].language, "python");
    }
}
