//! Ranker: combines vector similarity with exact-match, name-match, recency,
//! and complexity factors into one final score, then deduplicates by
//! `(file, line)`.
//!
//! Grounded on `hybrid.rs`'s bonus-calculation style (`calculate_exact_match_bonus`,
//! `calculate_type_bonus`: tiered, multiplicative adjustments on top of a base
//! similarity score, plain functions over small config structs, no scoring
//! crate) but computes a single deterministic formula per result instead of
//! the teacher's RRF fusion across two collections — there is only one
//! collection here, so there is nothing to fuse.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::vector_store::SearchHit;

/// Tunable multipliers for the ranking formula. Defaults match the values
/// observed empirically to separate exact/name matches from near-misses
/// without letting any single factor dominate the vector score.
#[derive(Debug, Clone, Copy)]
pub struct RankerConfig {
    pub boost_exact: f32,
    pub boost_name: f32,
    pub boost_recency: f32,
    pub complexity_penalty_enabled: bool,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            boost_exact: 1.5,
            boost_name: 1.2,
            boost_recency: 1.1,
            complexity_penalty_enabled: true,
        }
    }
}

/// A ranked result: the original hit, its final score, and its 1-based rank.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub hit: SearchHit,
    pub final_score: f32,
    pub rank: usize,
}

fn exact_match(query: &str, code: &str) -> bool {
    code.to_lowercase().contains(&query.to_lowercase())
}

/// `[0,1]`: exact 1.0, case-insensitive prefix 0.9, contains 0.7, else
/// 0.5 times the fraction of the query's characters that also appear in
/// `name`.
fn name_match(query: &str, name: &str) -> f32 {
    let q = query.to_lowercase();
    let n = name.to_lowercase();
    if n == q {
        return 1.0;
    }
    if n.starts_with(&q) {
        return 0.9;
    }
    if n.contains(&q) {
        return 0.7;
    }
    let query_chars: HashSet<char> = q.chars().collect();
    if query_chars.is_empty() {
        return 0.5;
    }
    let name_chars: HashSet<char> = n.chars().collect();
    let overlap = query_chars.intersection(&name_chars).count();
    0.5 * (overlap as f32 / query_chars.len() as f32)
}

/// Steps down from 1.0 as `indexed_at` ages: `<=7d:1.0, <=14d:0.9, <=30d:0.8,
/// else 0.7`. Unparseable timestamps are treated as maximally stale (0.7) —
/// a ranking input should never fail on a malformed timestamp.
fn recency(indexed_at: &str, now: DateTime<Utc>) -> f32 {
    let Ok(stamp) = DateTime::parse_from_rfc3339(indexed_at) else {
        return 0.7;
    };
    let age_days = (now - stamp.with_timezone(&Utc)).num_days();
    if age_days <= 7 {
        1.0
    } else if age_days <= 14 {
        0.9
    } else if age_days <= 30 {
        0.8
    } else {
        0.7
    }
}

fn complexity_factor(hit: &SearchHit, config: &RankerConfig) -> f32 {
    if !config.complexity_penalty_enabled {
        return 1.0;
    }
    let Some(metadata) = &hit.payload.metadata else {
        return 1.0;
    };
    let Some(complexity) = metadata.complexity else {
        return 1.0;
    };
    (1.0 - (complexity / 50.0) as f32).max(0.5)
}

fn final_score(hit: &SearchHit, query: &str, config: &RankerConfig, now: DateTime<Utc>) -> f32 {
    let vector_score = hit.score;
    let exact = if exact_match(query, &hit.payload.code) {
        config.boost_exact
    } else {
        1.0
    };
    let name = name_match(query, &hit.payload.name);
    let rec = recency(&hit.payload.indexed_at, now);

    let mut score = vector_score
        * exact
        * (1.0 + name * (config.boost_name - 1.0))
        * (1.0 + (rec - 1.0) * config.boost_recency);

    score *= complexity_factor(hit, config);
    score
}

/// Ranks `hits` against `query`, sorting by final score descending (stable),
/// assigning 1-based ranks, then deduplicating by `(file, line)` — the
/// highest-ranked entry for each pair wins.
pub fn rank(hits: Vec<SearchHit>, query: &str, config: &RankerConfig) -> Vec<RankedHit> {
    let now = Utc::now();
    let mut scored: Vec<(SearchHit, f32)> = hits
        .into_iter()
        .map(|hit| {
            let score = final_score(&hit, query, config, now);
            (hit, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut ranked = Vec::with_capacity(scored.len());
    let mut rank_counter = 0usize;
    for (hit, score) in scored {
        rank_counter += 1;
        let key = (hit.payload.file.clone(), hit.payload.line);
        if !seen.insert(key) {
            continue;
        }
        ranked.push(RankedHit {
            hit,
            final_score: score,
            rank: rank_counter,
        });
    }

    // Ranks are assigned before deduplication (reflecting pre-dedup order)
    // but displayed rank should be contiguous post-dedup.
    for (i, r) in ranked.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_core::{BlockType, PointPayload};

    fn hit(file: &str, line: u32, score: f32, name: &str, code: &str) -> SearchHit {
        SearchHit {
            id: format!("{file}:{line}"),
            score,
            payload: PointPayload {
                file: file.into(),
                line,
                end_line: line,
                code: code.into(),
                block_type: BlockType::Function,
                name: name.into(),
                language: "rust".into(),
                path_segments: Default::default(),
                metadata: None,
                hash: "h".into(),
                indexed_at: Utc::now().to_rfc3339(),
            },
        }
    }

    #[test]
    fn test_exact_match_beats_higher_vector_score() {
        // R1 {vector_score:0.80, name=="foo"}, R2 {vector_score:0.70, name=="foo", exact_match}
        let r1 = hit("a.rs", 1, 0.80, "foo", "fn bar() {}");
        let r2 = hit("b.rs", 2, 0.70, "foo", "fn foo() { bar() }");
        let config = RankerConfig::default();
        let ranked = rank(vec![r1, r2], "foo", &config);

        assert_eq!(ranked[0].hit.payload.file, "b.rs");
        assert_eq!(ranked[1].hit.payload.file, "a.rs");
    }

    #[test]
    fn test_dedup_by_file_and_line_keeps_highest_ranked() {
        let a = hit("a.rs", 1, 0.9, "foo", "fn foo() {}");
        let b = hit("a.rs", 1, 0.1, "foo", "fn foo() {}");
        let ranked = rank(vec![a, b], "foo", &RankerConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].hit.score, 0.9);
    }

    #[test]
    fn test_ranks_are_contiguous_and_one_based() {
        let hits = vec![
            hit("a.rs", 1, 0.9, "a", "fn a() {}"),
            hit("b.rs", 2, 0.5, "b", "fn b() {}"),
        ];
        let ranked = rank(hits, "x", &RankerConfig::default());
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_name_match_tiers() {
        assert_eq!(name_match("foo", "foo"), 1.0);
        assert_eq!(name_match("foo", "foobar"), 0.9);
        assert_eq!(name_match("foo", "xfoox"), 0.7);
    }

    #[test]
    fn test_recency_steps() {
        let now = Utc::now();
        assert_eq!(recency(&now.to_rfc3339(), now), 1.0);
        assert_eq!(recency(&(now - chrono::Duration::days(10)).to_rfc3339(), now), 0.9);
        assert_eq!(recency(&(now - chrono::Duration::days(20)).to_rfc3339(), now), 0.8);
        assert_eq!(recency(&(now - chrono::Duration::days(40)).to_rfc3339(), now), 0.7);
        assert_eq!(recency("not-a-date", now), 0.7);
    }
}
