//! Enricher: wraps a `CodeBlock`'s raw code with contextual facets before it
//! is handed to the embedder, so the embedding reflects more than bare
//! syntax (file path, block type, name, language, and — for descriptive
//! output — signature and doc-comment detail).

use crate::model::CodeBlock;

/// Output shape requested of the enricher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichFormat {
    /// A single-line header followed by the code, minimal overhead.
    Compact,
    /// A multi-line prose header covering signature, visibility, and doc
    /// comment, followed by the code.
    Descriptive,
    /// A `key: value` field block followed by the code, convenient for
    /// downstream parsing.
    Structured,
}

/// Maximum length of a cleaned doc comment folded into enriched text.
pub const DOC_COMMENT_MAX_LEN: usize = 200;

/// Maximum length of the enriched output; longer output is truncated with
/// a trailing marker rather than rejected.
pub const MAX_ENRICHED_LEN: usize = 8000;

const TRUNCATION_MARKER: &str = "\n// ... (truncated)";

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub format: EnrichFormat,
    pub max_len: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            format: EnrichFormat::Compact,
            max_len: MAX_ENRICHED_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Enricher;

impl Enricher {
    pub fn new() -> Self {
        Self
    }

    pub fn enrich(&self, block: &CodeBlock, options: &EnrichOptions) -> String {
        let header = match options.format {
            EnrichFormat::Compact => self.compact_header(block),
            EnrichFormat::Descriptive => self.descriptive_header(block),
            EnrichFormat::Structured => self.structured_header(block),
        };
        let enriched = format!("{header}\n{}", block.code);
        truncate(&enriched, options.max_len)
    }

    fn compact_header(&self, block: &CodeBlock) -> String {
        format!(
            "// {} {} in {} ({})",
            block.block_type, block.name, block.file, block.language
        )
    }

    fn descriptive_header(&self, block: &CodeBlock) -> String {
        let mut lines = vec![format!(
            "// {} `{}` defined in {} (lines {}-{}, {})",
            block.block_type, block.name, block.file, block.line, block.end_line, block.language
        )];

        if let Some(meta) = &block.metadata {
            if !meta.parameters.is_empty() {
                lines.push(format!("// parameters: {}", meta.parameters.join(", ")));
            }
            if let Some(ret) = &meta.return_type {
                lines.push(format!("// returns: {ret}"));
            }
            if meta.is_async {
                lines.push("// async".to_string());
            }
            if let Some(vis) = &meta.visibility {
                lines.push(format!("// visibility: {vis}"));
            }
            if let Some(doc) = &meta.comments {
                lines.push(format!("// {}", clean_doc_comment(doc)));
            }
        }

        lines.join("\n")
    }

    fn structured_header(&self, block: &CodeBlock) -> String {
        let mut lines = vec![
            format!("type: {}", block.block_type),
            format!("name: {}", block.name),
            format!("file: {}", block.file),
            format!("language: {}", block.language),
            format!("lines: {}-{}", block.line, block.end_line),
        ];

        if let Some(meta) = &block.metadata {
            if !meta.parameters.is_empty() {
                lines.push(format!("parameters: {}", meta.parameters.join(", ")));
            }
            if let Some(ret) = &meta.return_type {
                lines.push(format!("return_type: {ret}"));
            }
            if let Some(vis) = &meta.visibility {
                lines.push(format!("visibility: {vis}"));
            }
            lines.push(format!("async: {}", meta.is_async));
            if let Some(doc) = &meta.comments {
                lines.push(format!("doc: {}", clean_doc_comment(doc)));
            }
        }

        lines.join("\n")
    }
}

/// Strip common doc-comment markers (`///`, `/**`, `*`, `#`) and collapse
/// whitespace, then cap at `DOC_COMMENT_MAX_LEN` characters.
fn clean_doc_comment(raw: &str) -> String {
    let cleaned: String = raw
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("///")
                .trim_start_matches("/**")
                .trim_start_matches("*/")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() > DOC_COMMENT_MAX_LEN {
        let truncated: String = cleaned.chars().take(DOC_COMMENT_MAX_LEN).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let budget = max_len.saturating_sub(TRUNCATION_MARKER.len());
    let mut cut = budget.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &text[..cut], TRUNCATION_MARKER)
}
