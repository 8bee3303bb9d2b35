use crate::error::Result;

/// Maps text to fixed-size dense vectors.
///
/// Implementations must be deterministic for a fixed model version and
/// must return vectors of a constant dimension. Empty or whitespace-only
/// input is an [`crate::error::Error::Embedding`] failure, never a zero
/// vector.
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality, uniform across the provider's lifetime.
    fn dim(&self) -> usize;
    /// Maximum input length in tokens.
    fn max_len(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Joint (query, candidate) relevance estimation, the cross-encoder seam.
///
/// Returns one raw score per candidate text, in input order. Scores are
/// only meaningful relative to the batch; the reranker normalizes them.
#[async_trait::async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

/// Synchronous call into a text-generation backend.
///
/// All-or-nothing per call: transport failures and empty completions
/// surface as [`crate::error::Error::Generation`] with no retry and no
/// fabricated output.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
