//! Cross-encoder reranking over the vector index's candidate pool.
//!
//! Raw cross-encoder scores are min-max normalized to [0, 1] per batch,
//! then boosted by a configurable domain keyword set; boosted scores may
//! exceed 1.0. Candidates under the caller's threshold are dropped, the
//! rest are stably sorted (exact ties keep candidate-pool order) and
//! truncated. The final score is also written into each chunk's metadata
//! for downstream inspection.

use propgen_core::config::RerankSettings;
use propgen_core::error::Result;
use propgen_core::traits::RelevanceScorer;
use propgen_core::types::{DocumentChunk, RankedChunk, META_RERANK_SCORE};

pub mod scorer;

use scorer::{HttpCrossEncoder, LexicalScorer};

pub struct Reranker {
    scorer: Box<dyn RelevanceScorer>,
    keywords: Vec<String>,
    boost_per_keyword: f32,
}

impl Reranker {
    pub fn new(
        scorer: Box<dyn RelevanceScorer>,
        keywords: Vec<String>,
        boost_per_keyword: f32,
    ) -> Self {
        let keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        Self { scorer, keywords, boost_per_keyword }
    }

    /// Build from settings: a configured endpoint selects the HTTP
    /// cross-encoder, otherwise the deterministic lexical scorer.
    pub fn from_settings(settings: &RerankSettings) -> Result<Self> {
        let scorer: Box<dyn RelevanceScorer> = if settings.base_url.is_some() {
            Box::new(HttpCrossEncoder::new(settings)?)
        } else {
            tracing::info!("no rerank endpoint configured, using lexical scorer");
            Box::new(LexicalScorer)
        };
        Ok(Self::new(scorer, settings.keywords.clone(), settings.boost_per_keyword))
    }

    /// Score, normalize, boost, filter, and rank the candidate pool.
    ///
    /// An empty pool yields an empty result, not an error.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<DocumentChunk>,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RankedChunk>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let raw = self.scorer.score_pairs(query, &texts).await?;
        if raw.len() != candidates.len() {
            return Err(propgen_core::error::Error::Rerank(format!(
                "scorer returned {} scores for {} candidates",
                raw.len(),
                candidates.len()
            )));
        }

        let normalized = min_max_normalize(&raw);
        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .zip(normalized)
            .map(|(mut chunk, base)| {
                let score = base + self.keyword_boost(&chunk.content);
                chunk.meta.insert(META_RERANK_SCORE.to_string(), score.to_string());
                RankedChunk { chunk, score }
            })
            .filter(|r| r.score >= min_score)
            .collect();

        // Vec::sort_by is stable: exact ties keep candidate-pool order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        Ok(ranked)
    }

    /// +boost per distinct keyword present in the text, case-insensitive.
    fn keyword_boost(&self, content: &str) -> f32 {
        let content_lower = content.to_lowercase();
        let matched = self.keywords.iter().filter(|k| content_lower.contains(k.as_str())).count();
        matched as f32 * self.boost_per_keyword
    }
}

/// Min-max scale a score batch to [0, 1]. A degenerate batch (all scores
/// equal, including a single candidate) maps to 1.0 so a lone perfect
/// candidate is not filtered out.
fn min_max_normalize(raw: &[f32]) -> Vec<f32> {
    let min = raw.iter().copied().fold(f32::INFINITY, f32::min);
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return vec![1.0; raw.len()];
    }
    raw.iter().map(|s| (s - min) / (max - min)).collect()
}
