use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use propgen_core::config::Settings;
use propgen_core::error::{Error, Result};
use propgen_core::traits::TextGenerator;
use propgen_core::types::{META_RERANK_SCORE, SOURCE_GENERATED};
use propgen_embed::HashEmbedder;
use propgen_rag::ProposalPipeline;
use propgen_rerank::scorer::LexicalScorer;
use propgen_rerank::Reranker;

/// Records every prompt it sees and answers with a fixed draft.
struct RecordingGenerator {
    prompts: Arc<Mutex<Vec<String>>>,
    reply: String,
}

#[async_trait::async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|e| Error::Generation(e.to_string()))?
            .push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Stalls long enough for any pipeline deadline to fire first.
struct StallingGenerator;

#[async_trait::async_trait]
impl TextGenerator for StallingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }
}

fn test_pipeline(reply: &str) -> (ProposalPipeline, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let generator = Box::new(RecordingGenerator {
        prompts: prompts.clone(),
        reply: reply.to_string(),
    });
    let pipeline = ProposalPipeline::new(
        Arc::new(HashEmbedder::new(128)),
        Reranker::new(Box::new(LexicalScorer), Vec::new(), 0.05),
        generator,
        Settings::default(),
    );
    (pipeline, prompts)
}

fn write_corpus(dir: &Path) -> anyhow::Result<()> {
    std::fs::write(
        dir.join("audit.txt"),
        "Skillia delivers AI security audits for public banks.",
    )?;
    std::fs::write(
        dir.join("crisis.txt"),
        "Crisis management tabletop exercises simulate ransomware incidents.",
    )?;
    std::fs::write(
        dir.join("data.md"),
        "Data platform migration roadmap with governance milestones.",
    )?;
    Ok(())
}

#[tokio::test]
async fn rebuild_then_run_grounds_the_draft() -> anyhow::Result<()> {
    let corpus = tempfile::tempdir()?;
    let index = tempfile::tempdir()?;
    write_corpus(corpus.path())?;
    let (pipeline, prompts) = test_pipeline("Proposal: phased AI security audit.");

    let indexed = pipeline.rebuild_index(corpus.path(), index.path()).await?;
    assert_eq!(indexed, 3, "one chunk per short corpus file");

    let outcome = pipeline
        .run("AI security audits public banks", index.path())
        .await?;
    assert_eq!(outcome.text, "Proposal: phased AI security audit.");
    assert!(!outcome.sources.is_empty());
    assert_eq!(outcome.sources[0].chunk.doc_id, "audit");
    for r in &outcome.sources {
        assert!(r.chunk.meta.contains_key(META_RERANK_SCORE));
    }
    for pair in outcome.sources.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let recorded = prompts.lock().ok().map(|p| p.clone()).unwrap_or_default();
    assert_eq!(recorded.len(), 1);
    assert!(
        recorded[0].contains("AI security audits for public banks"),
        "the prompt must carry the retrieved grounding"
    );
    assert!(recorded[0].contains("AI security audits public banks"), "and the brief itself");
    Ok(())
}

#[tokio::test]
async fn single_document_corpus_answers_an_indirect_brief() -> anyhow::Result<()> {
    let corpus = tempfile::tempdir()?;
    let index = tempfile::tempdir()?;
    std::fs::write(
        corpus.path().join("skillia.txt"),
        "Skillia delivers AI security audits for public banks.",
    )?;
    let (pipeline, prompts) = test_pipeline("Draft.");
    assert_eq!(pipeline.rebuild_index(corpus.path(), index.path()).await?, 1);

    // The brief shares only a couple of tokens with the lone chunk; a
    // single-candidate batch still normalizes to a full score.
    let outcome = pipeline
        .run("cybersecurity support for a public bank", index.path())
        .await?;
    assert!(!outcome.text.is_empty());
    assert_eq!(outcome.sources.len(), 1);
    assert!(outcome.sources[0].score >= 0.0 && outcome.sources[0].score <= 1.0);

    let recorded = prompts.lock().ok().map(|p| p.clone()).unwrap_or_default();
    assert!(recorded[0].contains("AI security audits"));
    Ok(())
}

#[tokio::test]
async fn run_against_missing_index_fails_hard() {
    let index = tempfile::tempdir().expect("tempdir");
    let (pipeline, _) = test_pipeline("unused");
    let err = pipeline
        .run("anything", &index.path().join("never-built"))
        .await
        .expect_err("missing index must not degrade silently");
    assert!(matches!(err, Error::IndexUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn deadline_cuts_off_a_stalled_backend() -> anyhow::Result<()> {
    let corpus = tempfile::tempdir()?;
    let index = tempfile::tempdir()?;
    write_corpus(corpus.path())?;
    let pipeline = ProposalPipeline::new(
        Arc::new(HashEmbedder::new(128)),
        Reranker::new(Box::new(LexicalScorer), Vec::new(), 0.05),
        Box::new(StallingGenerator),
        Settings::default(),
    );
    pipeline.rebuild_index(corpus.path(), index.path()).await?;

    let err = pipeline
        .run_with_timeout("security audit", index.path(), Duration::from_millis(500))
        .await
        .expect_err("deadline must fire");
    assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn accepted_proposal_becomes_retrievable() -> anyhow::Result<()> {
    let corpus = tempfile::tempdir()?;
    let index = tempfile::tempdir()?;
    write_corpus(corpus.path())?;
    let (pipeline, _) = test_pipeline("unused");
    let before = pipeline.rebuild_index(corpus.path(), index.path()).await?;

    let doc_id = pipeline
        .accept_proposal(
            "honeypot deployment",
            "We propose a quantum mesh honeypot deployment across all branch offices.",
            index.path(),
        )
        .await?;
    assert!(doc_id.starts_with("generated_"));

    let outcome = pipeline.run("quantum mesh honeypot deployment", index.path()).await?;
    let hit = outcome
        .sources
        .iter()
        .find(|r| r.chunk.doc_id == doc_id)
        .expect("accepted proposal must be retrievable");
    assert_eq!(hit.chunk.source, SOURCE_GENERATED);
    assert_eq!(hit.chunk.meta.get("query").map(String::as_str), Some("honeypot deployment"));
    assert!(hit.chunk.meta.contains_key("generated_at"));

    // One short proposal adds exactly one chunk on top of the corpus.
    let reopened = propgen_vector::VectorIndex::open(
        index.path(),
        Arc::new(HashEmbedder::new(128)),
    )
    .await?;
    assert_eq!(reopened.count().await?, before + 1);
    Ok(())
}

#[tokio::test]
async fn first_acceptance_may_precede_any_rebuild() -> anyhow::Result<()> {
    let index = tempfile::tempdir()?;
    let (pipeline, _) = test_pipeline("unused");
    let doc_id = pipeline
        .accept_proposal("brief", "A complete incident response retainer offering.", index.path())
        .await?;
    assert!(doc_id.starts_with("generated_"));

    let outcome = pipeline.run("incident response retainer", index.path()).await?;
    assert_eq!(outcome.sources[0].chunk.doc_id, doc_id);
    Ok(())
}

#[tokio::test]
async fn simultaneous_acceptances_both_commit() -> anyhow::Result<()> {
    let index = tempfile::tempdir()?;
    let (pipeline, _) = test_pipeline("unused");

    // Both acceptances race at first-index creation and at the append;
    // the per-path write lock must serialize them.
    let (first, second) = tokio::join!(
        pipeline.accept_proposal(
            "brief one",
            "Red team engagement summary for branch offices.",
            index.path(),
        ),
        pipeline.accept_proposal(
            "brief two",
            "Blue team monitoring runbook for cloud workloads.",
            index.path(),
        ),
    );
    let (first, second) = (first?, second?);
    assert_ne!(first, second);

    let reopened =
        propgen_vector::VectorIndex::open(index.path(), Arc::new(HashEmbedder::new(128))).await?;
    assert_eq!(reopened.count().await?, 2, "both proposals must land");
    Ok(())
}

#[tokio::test]
async fn indexing_needs_no_generation_credentials() -> anyhow::Result<()> {
    std::env::set_var("PROPGEN_USE_HASH_EMBEDDINGS", "1");
    std::env::remove_var("OPENAI_API_KEY");
    let corpus = tempfile::tempdir()?;
    let index = tempfile::tempdir()?;
    std::fs::write(corpus.path().join("audit.txt"), "Security audit scoping checklist.")?;

    let pipeline = ProposalPipeline::from_settings(Settings::default())?;
    assert_eq!(pipeline.rebuild_index(corpus.path(), index.path()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn repeated_acceptances_are_distinct_documents() -> anyhow::Result<()> {
    let index = tempfile::tempdir()?;
    let (pipeline, _) = test_pipeline("unused");
    let text = "Identical proposal text accepted twice.";
    let first = pipeline.accept_proposal("brief", text, index.path()).await?;
    let second = pipeline.accept_proposal("brief", text, index.path()).await?;
    assert_ne!(first, second, "each acceptance is a new event");
    Ok(())
}

#[tokio::test]
async fn empty_proposal_is_refused() {
    let index = tempfile::tempdir().expect("tempdir");
    let (pipeline, _) = test_pipeline("unused");
    let err = pipeline
        .accept_proposal("brief", "   \n  ", index.path())
        .await
        .expect_err("whitespace-only proposal must be refused");
    assert!(matches!(err, Error::Embedding { .. }), "got {err:?}");
}

#[tokio::test]
async fn baseline_draft_skips_retrieval_entirely() -> anyhow::Result<()> {
    let (pipeline, prompts) = test_pipeline("Baseline draft.");
    let text = pipeline.generate_without_retrieval("secure our payment platform").await?;
    assert_eq!(text, "Baseline draft.");

    let recorded = prompts.lock().ok().map(|p| p.clone()).unwrap_or_default();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].contains("secure our payment platform"));
    assert!(!recorded[0].contains("Reference material"));
    Ok(())
}
