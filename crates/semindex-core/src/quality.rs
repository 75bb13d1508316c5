//! Quality Filter: scores a `CodeBlock` on how likely it is to be useful in
//! search results, so near-empty or boilerplate-only blocks never reach the
//! embedder.
//!
//! The score is a weighted blend of cheap lexical signals rather than a
//! learned model: meaningful-content ratio, character diversity, and a
//! meaningful-token count, adjusted by a block-type bonus, a named-entity
//! bonus, and a length bonus. A block consisting only of closing
//! punctuation (a stray `}` left over from a bad span) is penalized
//! regardless of how the rest of the formula would have scored it.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::model::{BlockType, CodeBlock};

/// Minimum score for a block to survive the filter.
pub const QUALITY_THRESHOLD: f64 = 0.3;

/// Tokens that carry no semantic weight and are excluded from the
/// meaningful-token count.
const NOISE_TOKENS: &[&str] = &[
    "{", "}", "(", ")", "[", "]", ";", ",", ".", "->", "=>", "::", ":", "pass", "...", "end",
    "begin", "self", "this",
];

fn noise_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| NOISE_TOKENS.iter().copied().collect())
}

/// The computed score plus a breakdown, useful for debugging/tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScore {
    pub score: f64,
    pub content_ratio: f64,
    pub diversity: f64,
    pub token_score: f64,
    pub length_bonus: f64,
    pub type_bonus: f64,
    pub name_bonus: f64,
    pub closing_only: bool,
}

impl QualityScore {
    pub fn passes(&self) -> bool {
        self.score >= QUALITY_THRESHOLD
    }
}

/// A per-`BlockType` bonus reflecting how likely that kind of unit is to be
/// a useful, self-contained search result.
fn type_bonus(block_type: BlockType) -> f64 {
    match block_type {
        BlockType::Function | BlockType::Method => 0.10,
        BlockType::Class | BlockType::Struct | BlockType::Enum | BlockType::Trait => 0.10,
        BlockType::Interface | BlockType::Impl | BlockType::Module | BlockType::Namespace => 0.05,
        BlockType::MarkdownSection => 0.05,
        BlockType::Type | BlockType::Constant | BlockType::Variable => 0.0,
        BlockType::Chunk => 0.0,
    }
}

fn tokenize(code: &str) -> Vec<&str> {
    code.split(|c: char| c.is_whitespace())
        .flat_map(|word| {
            word.split_inclusive(|c: char| !c.is_alphanumeric() && c != '_')
                .flat_map(|s| {
                    let trimmed = s.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
                    [trimmed, &s[trimmed.len()..]]
                })
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_closing_only(code: &str) -> bool {
    let trimmed = code.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| matches!(c, '}' | ')' | ']' | ';' | ',' | '\n' | '\r' | ' ' | '\t'))
}

/// Score a block per the quality formula. Pure function of the block's
/// content, name, and type.
pub fn score_block(block: &CodeBlock) -> QualityScore {
    let code = block.code.as_str();
    let trimmed = code.trim();
    let closing_only = is_closing_only(code);

    let total_chars = trimmed.chars().count().max(1);
    let meaningful_chars = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .count();
    let content_ratio = meaningful_chars as f64 / total_chars as f64;

    let unique_chars: HashSet<char> = trimmed.chars().collect();
    let diversity = (unique_chars.len() as f64 / total_chars.min(40) as f64).min(1.0);

    let tokens = tokenize(trimmed);
    let noise = noise_set();
    let meaningful_tokens = tokens
        .iter()
        .filter(|t| t.chars().any(|c| c.is_alphanumeric()) && !noise.contains(*t))
        .count();
    let token_score = (meaningful_tokens as f64 / 10.0).min(1.0);

    let length_bonus = (code.len() as f64 / 200.0).min(1.0);

    let bonus_type = type_bonus(block.block_type);

    let name_bonus = if block.name != "anonymous" && block.name.len() >= 2 {
        0.15
    } else {
        0.0
    };

    let mut score =
        0.3 * content_ratio + 0.2 * diversity + 0.2 * token_score + 0.1 * length_bonus;
    score += bonus_type + name_bonus;
    score = score.clamp(0.0, 1.0);

    if closing_only {
        score *= 0.1;
    }

    QualityScore {
        score,
        content_ratio,
        diversity,
        token_score,
        length_bonus,
        type_bonus: bonus_type,
        name_bonus,
        closing_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(code: &str, block_type: BlockType, name: Option<&str>) -> CodeBlock {
        CodeBlock::new(
            "a.ts",
            1,
            (code.lines().count().max(1)) as u32,
            code,
            block_type,
            name.map(|s| s.to_string()),
            "typescript",
        )
    }

    #[test]
    fn test_closing_brace_scores_below_threshold() {
        let b = block("}", BlockType::Chunk, None);
        let score = score_block(&b);
        assert!(score.closing_only);
        assert!(score.score < QUALITY_THRESHOLD);
    }

    #[test]
    fn test_well_named_function_passes() {
        let code = "export function calculateTotalPrice(items: Item[]): number {\n  return items.reduce((sum, item) => sum + item.price, 0);\n}";
        let b = block(code, BlockType::Function, Some("calculateTotalPrice"));
        let score = score_block(&b);
        assert!(score.passes(), "score was {:?}", score);
    }

    #[test]
    fn test_anonymous_block_gets_no_name_bonus() {
        let code = "export function calculateTotalPrice(items: Item[]): number {\n  return items.reduce((sum, item) => sum + item.price, 0);\n}";
        let named = score_block(&block(code, BlockType::Function, Some("calculateTotalPrice")));
        let anon = score_block(&block(code, BlockType::Function, None));
        assert!(named.score > anon.score);
    }

    #[test]
    fn test_type_bonus_favors_semantic_blocks_over_chunks() {
        let code = "fn helper(x: i32) -> i32 {\n    x + 1\n}";
        let function_score = score_block(&block(code, BlockType::Function, Some("helper")));
        let chunk_score = score_block(&block(code, BlockType::Chunk, Some("helper")));
        assert!(function_score.score > chunk_score.score);
    }

    #[test]
    fn test_repeated_character_has_lower_diversity_than_real_code() {
        let repeated = block(&"a".repeat(50), BlockType::Chunk, None);
        let code = "export function calculateTotalPrice(items: Item[]): number {\n  return items.reduce((sum, item) => sum + item.price, 0);\n}";
        let real = block(code, BlockType::Function, Some("calculateTotalPrice"));
        assert!(score_block(&repeated).diversity < score_block(&real).diversity);
    }
}
