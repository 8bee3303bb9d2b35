//! Retrieval context assembly.
//!
//! Reranked chunks are concatenated into a single prompt block in rank
//! order, then hard-truncated to a character budget. Truncation is a
//! blunt cut, even mid-sentence; the budget is an absolute ceiling for
//! the generation backend, not a formatting nicety.

use propgen_core::types::RankedChunk;

pub const DEFAULT_CONTEXT_BUDGET: usize = 12_000;

const CHUNK_JOINER: &str = "\n\n";

/// Join the chunks' trimmed contents with blank lines, best-ranked first,
/// capped at `budget` characters.
pub fn assemble_context(ranked: &[RankedChunk], budget: usize) -> String {
    let joined = ranked
        .iter()
        .map(|r| r.chunk.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(CHUNK_JOINER);
    truncate_chars(joined, budget)
}

/// Cut `s` down to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use propgen_core::types::{DocumentChunk, Meta};

    fn ranked(content: &str, score: f32) -> RankedChunk {
        RankedChunk {
            chunk: DocumentChunk {
                id: "d:0".to_string(),
                doc_id: "d".to_string(),
                source: "d.txt".to_string(),
                page: 0,
                content: content.to_string(),
                chunk_index: 0,
                total_chunks: 1,
                meta: Meta::new(),
            },
            score,
        }
    }

    #[test]
    fn joins_in_rank_order_with_blank_lines() {
        let chunks = vec![ranked("first chunk", 0.9), ranked("  second chunk  ", 0.5)];
        let out = assemble_context(&chunks, DEFAULT_CONTEXT_BUDGET);
        assert_eq!(out, "first chunk\n\nsecond chunk");
    }

    #[test]
    fn under_budget_input_survives_unchanged() {
        let chunks = vec![ranked("short", 1.0)];
        assert_eq!(assemble_context(&chunks, 100), "short");
    }

    #[test]
    fn truncates_to_the_character_budget() {
        let chunks = vec![ranked(&"x".repeat(50), 0.9), ranked(&"y".repeat(50), 0.5)];
        let out = assemble_context(&chunks, 60);
        assert_eq!(out.chars().count(), 60);
        assert!(out.starts_with(&"x".repeat(50)));
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let chunks = vec![ranked(&"é".repeat(40), 1.0)];
        let out = assemble_context(&chunks, 10);
        assert_eq!(out.chars().count(), 10);
        assert_eq!(out, "é".repeat(10));
    }

    #[test]
    fn empty_and_whitespace_chunks_are_skipped() {
        let chunks = vec![ranked("   ", 0.9), ranked("useful", 0.5)];
        assert_eq!(assemble_context(&chunks, 100), "useful");
        assert_eq!(assemble_context(&[], 100), "");
    }
}
