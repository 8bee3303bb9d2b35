//! Offline quality metrics.
//!
//! `chunk_coverage` measures how much of the retrieved grounding actually
//! made it into the generated text, as the fraction of source characters
//! covered by each chunk's longest run of text reused verbatim.
//! `draft_similarity` compares two drafts in embedding space; together
//! they quantify what retrieval adds over a context-free draft.

use propgen_core::error::Result;
use propgen_core::traits::Embedder;
use propgen_core::types::RankedChunk;

/// Fraction in [0, 1] of grounding material reused by `generated`.
///
/// For each source chunk, the longest substring shared with the generated
/// text is found (case-insensitive); coverage is the summed match lengths
/// over the summed chunk lengths. No sources yields 0.0.
pub fn chunk_coverage(generated: &str, sources: &[RankedChunk]) -> f32 {
    let generated_chars: Vec<char> = generated.to_lowercase().chars().collect();
    let mut matched = 0usize;
    let mut total = 0usize;
    for ranked in sources {
        let chunk_chars: Vec<char> = ranked.chunk.content.to_lowercase().chars().collect();
        if chunk_chars.is_empty() {
            continue;
        }
        total += chunk_chars.len();
        matched += longest_common_run(&generated_chars, &chunk_chars);
    }
    if total == 0 {
        return 0.0;
    }
    (matched as f32 / total as f32).min(1.0)
}

/// Cosine similarity between two drafts' embeddings, typically the
/// grounded proposal and the retrieval-free baseline for the same brief.
/// Both drafts go through the same provider, so dimensions always agree.
pub fn draft_similarity(embedder: &dyn Embedder, a: &str, b: &str) -> Result<f32> {
    let va = embedder.embed(a)?;
    let vb = embedder.embed(b)?;
    Ok(cosine(&va, &vb))
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Length of the longest contiguous run present in both sequences.
fn longest_common_run(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // One DP row per b-position, rolled over a.
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for &ca in a {
        let mut row = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}
