//! End-to-end proposal pipeline.
//!
//! Orchestrates corpus ingestion, vector retrieval, cross-encoder
//! reranking, context assembly, and generation. Collaborators come in
//! through the trait seams so tests can swap the generation backend or
//! the embedding provider without touching the pipeline logic.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use propgen_core::chunker::Chunker;
use propgen_core::config::Settings;
use propgen_core::error::{Error, Result};
use propgen_core::loader;
use propgen_core::traits::{Embedder, TextGenerator};
use propgen_core::types::{RankedChunk, SourceDocument, SOURCE_GENERATED};
use propgen_rerank::Reranker;
use propgen_vector::VectorIndex;

use crate::context::assemble_context;
use crate::llm::OpenAiGenerator;
use crate::prompt;

/// Distinguishes acceptances committed within the same millisecond.
static ACCEPT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A drafted proposal together with the chunks it was grounded on, in
/// rank order, each carrying its rerank score in metadata.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub text: String,
    pub sources: Vec<RankedChunk>,
}

pub struct ProposalPipeline {
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    /// Constructed on first generation call, so indexing-only callers
    /// never need generation credentials.
    generator: OnceCell<Box<dyn TextGenerator>>,
    settings: Settings,
}

impl ProposalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reranker: Reranker,
        generator: Box<dyn TextGenerator>,
        settings: Settings,
    ) -> Self {
        Self { embedder, reranker, generator: OnceCell::new_with(Some(generator)), settings }
    }

    /// Wire up the default collaborators: the environment-selected
    /// embedder and the configured rerank scorer. The OpenAI-compatible
    /// generation backend is deferred until a generation path runs.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(propgen_embed::default_embedder()?);
        let reranker = Reranker::from_settings(&settings.rerank)?;
        Ok(Self { embedder, reranker, generator: OnceCell::new(), settings })
    }

    async fn generator(&self) -> Result<&dyn TextGenerator> {
        let generator = self
            .generator
            .get_or_try_init(|| async {
                let backend = OpenAiGenerator::from_settings(&self.settings.generation)?;
                Ok::<Box<dyn TextGenerator>, Error>(Box::new(backend))
            })
            .await?;
        Ok(generator.as_ref())
    }

    /// Re-ingest the corpus from scratch: load, chunk, embed, and persist
    /// a fresh index at `index_path`, replacing whatever was there.
    /// Returns the number of chunks indexed.
    pub async fn rebuild_index(&self, source_dir: &Path, index_path: &Path) -> Result<usize> {
        let documents = loader::load_directory(source_dir)?;
        let chunker = self.chunker()?;
        let chunks = chunker.split_documents(&documents);
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "corpus chunked for indexing"
        );
        let index = VectorIndex::build(index_path, self.embedder.clone(), &chunks).await?;
        index.count().await
    }

    /// Draft a proposal for `query` against the index at `index_path`.
    ///
    /// Retrieval fetches a wide candidate pool, reranking narrows it, and
    /// the surviving chunks ground the generation prompt. Every stage
    /// failure propagates; there is no degraded retrieval path here.
    pub async fn run(&self, query: &str, index_path: &Path) -> Result<PipelineOutcome> {
        let retrieval = &self.settings.retrieval;
        let index = VectorIndex::open(index_path, self.embedder.clone()).await?;
        let candidates = index.search(query, retrieval.candidate_k).await?;
        tracing::info!(candidates = candidates.len(), "candidate pool retrieved");

        let pool = candidates.into_iter().map(|r| r.chunk).collect();
        let ranked = self
            .reranker
            .rerank(query, pool, retrieval.final_k, retrieval.min_score)
            .await?;
        tracing::info!(selected = ranked.len(), "reranking complete");

        let context = assemble_context(&ranked, self.settings.generation.context_budget);
        let prompt = prompt::proposal_prompt(&context, query);
        let text = self.generator().await?.generate(&prompt).await?;
        Ok(PipelineOutcome { text, sources: ranked })
    }

    /// [`ProposalPipeline::run`] under a deadline spanning retrieval,
    /// reranking, and generation together.
    pub async fn run_with_timeout(
        &self,
        query: &str,
        index_path: &Path,
        deadline: Duration,
    ) -> Result<PipelineOutcome> {
        tokio::time::timeout(deadline, self.run(query, index_path))
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }

    /// Feed an accepted proposal back into the index so future retrieval
    /// can draw on it. The proposal is chunked with the same settings as
    /// corpus documents and tagged as system-generated, with the query it
    /// answered and an acceptance timestamp in its metadata.
    ///
    /// Returns the new document id. Each acceptance is a distinct
    /// document, even for identical text.
    pub async fn accept_proposal(
        &self,
        query: &str,
        proposal_text: &str,
        index_path: &Path,
    ) -> Result<String> {
        let now = chrono::Utc::now();
        let seq = ACCEPT_SEQ.fetch_add(1, Ordering::Relaxed);
        let doc_id = format!("generated_{}_{seq}", now.format("%Y%m%d%H%M%S%3f"));

        let mut doc = SourceDocument::new(doc_id.clone(), SOURCE_GENERATED, proposal_text);
        doc.generated_at = Some(now.to_rfc3339());
        doc.extra.insert("query".to_string(), query.to_string());

        let chunks = self.chunker()?.split_document(&doc);
        if chunks.is_empty() {
            return Err(Error::Embedding {
                stage: "accept_proposal",
                reason: "proposal text produced no chunks".to_string(),
            });
        }

        // The first acceptance may precede any corpus rebuild, so an
        // absent index is created rather than refused.
        let index = VectorIndex::open_or_create(index_path, self.embedder.clone()).await?;
        let added = index.add(&chunks).await?;
        tracing::info!(%doc_id, chunks = added, "accepted proposal indexed");
        Ok(doc_id)
    }

    /// Ungrounded draft from the brief alone, for when no index exists or
    /// as a comparison baseline.
    pub async fn generate_without_retrieval(&self, query: &str) -> Result<String> {
        self.generator().await?.generate(&prompt::baseline_prompt(query)).await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared embedding provider, for callers computing draft
    /// similarity through the same model the index uses.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.settings.chunking.chunk_size, self.settings.chunking.chunk_overlap)
    }
}
