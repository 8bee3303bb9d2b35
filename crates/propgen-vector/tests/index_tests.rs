use std::sync::Arc;

use propgen_core::error::Error;
use propgen_core::types::{DocumentChunk, Meta};
use propgen_embed::HashEmbedder;
use propgen_vector::VectorIndex;

fn chunk(doc_id: &str, index: usize, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: format!("{doc_id}:{index}"),
        doc_id: doc_id.to_string(),
        source: format!("{doc_id}.txt"),
        page: 0,
        content: content.to_string(),
        chunk_index: index,
        total_chunks: 0,
        meta: Meta::new(),
    }
}

fn corpus() -> Vec<DocumentChunk> {
    vec![
        chunk("audit", 0, "Skillia delivers AI security audits for public banks."),
        chunk("crisis", 0, "Crisis management tabletop exercises simulate ransomware incidents."),
        chunk("data", 0, "Data platform migration roadmap with governance milestones."),
        chunk("training", 0, "Employee phishing awareness training curriculum and metrics."),
    ]
}

#[tokio::test]
async fn build_then_self_retrieval() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(128));
    let index = VectorIndex::build(tmp.path(), embedder, &corpus()).await?;

    assert_eq!(index.count().await?, 4);
    let hits = index
        .search("Skillia delivers AI security audits for public banks.", 1)
        .await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.id, "audit:0", "indexed text must retrieve itself");
    Ok(())
}

#[tokio::test]
async fn search_orders_by_descending_similarity() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(128));
    let index = VectorIndex::build(tmp.path(), embedder, &corpus()).await?;

    let hits = index.search("crisis management ransomware exercises", 4).await?;
    assert_eq!(hits.len(), 4);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "results must be similarity-descending");
    }
    assert_eq!(hits[0].chunk.doc_id, "crisis");
    Ok(())
}

#[tokio::test]
async fn search_returns_fewer_than_k_on_small_index() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(64));
    let index = VectorIndex::build(tmp.path(), embedder, &corpus()[..2]).await?;

    let hits = index.search("security audits", 10).await?;
    assert_eq!(hits.len(), 2);
    Ok(())
}

#[tokio::test]
async fn build_refuses_empty_chunk_set() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let embedder = Arc::new(HashEmbedder::new(64));
    let err = VectorIndex::build(tmp.path(), embedder, &[])
        .await
        .expect_err("empty build must fail");
    assert!(matches!(err, Error::IndexUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn build_refuses_to_wipe_a_non_index_directory() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    std::fs::write(tmp.path().join("notes.txt"), "unrelated data")?;
    let embedder = Arc::new(HashEmbedder::new(64));
    let err = VectorIndex::build(tmp.path(), embedder, &corpus())
        .await
        .expect_err("must refuse to wipe foreign content");
    assert!(matches!(err, Error::Store(_)), "got {err:?}");
    assert!(tmp.path().join("notes.txt").exists(), "foreign content must survive");
    Ok(())
}

#[tokio::test]
async fn rebuild_replaces_a_prior_index_in_place() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(64));
    VectorIndex::build(tmp.path(), embedder.clone(), &corpus()).await?;
    let rebuilt = VectorIndex::build(tmp.path(), embedder, &corpus()[..2]).await?;
    assert_eq!(rebuilt.count().await?, 2, "rebuild is a full replacement");
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_through_separate_handles_serialize() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(128));
    let built = VectorIndex::build(tmp.path(), embedder.clone(), &corpus()).await?;
    drop(built);

    // Two independently opened handles must contend on the same write
    // lock, not race at the commit.
    let a = VectorIndex::open(tmp.path(), embedder.clone()).await?;
    let b = VectorIndex::open(tmp.path(), embedder.clone()).await?;
    let chunks_a = [chunk(
        "gen_a",
        0,
        "Tabletop exercise retrospective for the payments team.",
    )];
    let chunks_b = [chunk("gen_b", 0, "Procurement security questionnaire answers.")];
    let (ra, rb) = tokio::join!(a.add(&chunks_a), b.add(&chunks_b));
    assert_eq!(ra? + rb?, 2);
    assert_eq!(a.count().await?, 6, "both appends must land");
    Ok(())
}

#[tokio::test]
async fn open_missing_index_is_unavailable() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("never-built");
    let embedder = Arc::new(HashEmbedder::new(64));
    let err = VectorIndex::open(&missing, embedder)
        .await
        .expect_err("open must fail");
    assert!(matches!(err, Error::IndexUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn search_empty_index_is_unavailable() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(64));
    // The feedback path may create an index with no entries yet.
    let index = VectorIndex::open_or_create(tmp.path(), embedder).await?;
    let err = index.search("anything", 5).await.expect_err("must fail");
    assert!(matches!(err, Error::IndexUnavailable(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn reopened_index_reproduces_search_results() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(128));
    let index = VectorIndex::build(tmp.path(), embedder.clone(), &corpus()).await?;
    let before: Vec<(String, f32)> = index
        .search("AI security audit", 3)
        .await?
        .into_iter()
        .map(|r| (r.chunk.id, r.score))
        .collect();
    drop(index);

    let reopened = VectorIndex::open(tmp.path(), embedder).await?;
    let after: Vec<(String, f32)> = reopened
        .search("AI security audit", 3)
        .await?
        .into_iter()
        .map(|r| (r.chunk.id, r.score))
        .collect();
    assert_eq!(before, after, "persisted index must answer identically");
    Ok(())
}

#[tokio::test]
async fn add_appends_without_rebuilding() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(128));
    let index = VectorIndex::build(tmp.path(), embedder, &corpus()).await?;
    assert_eq!(index.count().await?, 4);

    let added = index
        .add(&[chunk("generated_20250101", 0, "Zero-trust architecture blueprint for retail payment systems.")])
        .await?;
    assert_eq!(added, 1);
    assert_eq!(index.count().await?, 5);

    let hits = index.search("zero-trust architecture blueprint", 1).await?;
    assert_eq!(hits[0].chunk.doc_id, "generated_20250101");
    Ok(())
}

#[tokio::test]
async fn open_with_wrong_dimension_is_a_mismatch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index = VectorIndex::build(tmp.path(), Arc::new(HashEmbedder::new(128)), &corpus()).await?;
    drop(index);

    let err = VectorIndex::open(tmp.path(), Arc::new(HashEmbedder::new(64)))
        .await
        .expect_err("dimension mismatch must fail");
    assert!(
        matches!(err, Error::DimensionMismatch { expected: 128, actual: 64 }),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn chunk_metadata_round_trips_through_the_index() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(HashEmbedder::new(64));
    let mut c = chunk("audit", 0, "Security audit deliverables and planning.");
    c.meta.insert("query".to_string(), "cybersecurity support".to_string());
    let index = VectorIndex::build(tmp.path(), embedder, &[c]).await?;

    let hits = index.search("security audit deliverables", 1).await?;
    assert_eq!(
        hits[0].chunk.meta.get("query").map(String::as_str),
        Some("cybersecurity support")
    );
    Ok(())
}
