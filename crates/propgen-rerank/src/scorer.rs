//! Relevance scorers behind the [`RelevanceScorer`] seam.
//!
//! `HttpCrossEncoder` sends a single batch request to an OpenAI-compatible
//! `/v1/rerank` endpoint instead of making one LLM call per candidate.
//! `LexicalScorer` is a deterministic query-token overlap fallback for
//! offline runs and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use propgen_core::config::RerankSettings;
use propgen_core::error::{Error, Result};
use propgen_core::traits::RelevanceScorer;

pub struct HttpCrossEncoder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl HttpCrossEncoder {
    pub fn new(settings: &RerankSettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| Error::InvalidConfig("rerank.base_url not configured".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            model: settings.model.clone().unwrap_or_else(|| "default".to_string()),
            timeout: Duration::from_secs(settings.timeout_secs.min(30)),
        })
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for HttpCrossEncoder {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let url = format!("{}/v1/rerank", self.base_url.trim_end_matches('/'));
        let req_body = RerankRequest {
            model: self.model.clone(),
            query: query.to_string(),
            documents: texts.to_vec(),
            top_n: texts.len(),
        };
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| Error::Rerank(format!("failed to reach rerank endpoint: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Rerank(format!("rerank endpoint returned {status}: {body}")));
        }
        let body: RerankResponse = resp
            .json()
            .await
            .map_err(|e| Error::Rerank(format!("failed to parse rerank response: {e}")))?;

        // The endpoint answers sorted by relevance; put scores back into
        // candidate order.
        let mut scores = vec![0f32; texts.len()];
        for r in body.results {
            if r.index >= texts.len() {
                return Err(Error::Rerank(format!(
                    "rerank endpoint referenced candidate {} of {}",
                    r.index,
                    texts.len()
                )));
            }
            scores[r.index] = sigmoid(r.relevance_score);
        }
        Ok(scores)
    }
}

/// Sigmoid normalization: maps raw logits to the 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}

/// Fraction of distinct query tokens present in the candidate text.
/// No model, no I/O, stable across runs.
pub struct LexicalScorer;

#[async_trait::async_trait]
impl RelevanceScorer for LexicalScorer {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let query_lower = query.to_lowercase();
        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return Ok(vec![0.0; texts.len()]);
        }
        Ok(texts
            .iter()
            .map(|text| {
                let text_lower = text.to_lowercase();
                let matched = query_words.iter().filter(|w| text_lower.contains(**w)).count();
                matched as f32 / query_words.len() as f32
            })
            .collect())
    }
}
