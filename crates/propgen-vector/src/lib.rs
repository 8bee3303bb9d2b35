//! LanceDB-backed vector index over document chunks.
//!
//! The index path names a directory holding the complete persisted state:
//! chunk payloads, their vectors, and the index metadata all live in one
//! Lance dataset, so a directory is either a whole index or not an index.
//! Every `build`/`add` commits durably before returning; `open` is the
//! load operation and fails with `IndexUnavailable` when nothing was ever
//! persisted at the path.
//!
//! Ordering convention: cosine distance from Lance is converted to a
//! similarity score `1 - distance` and results are returned highest
//! similarity first. Downstream reranking treats this purely as candidate
//! pool order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};

use arrow_array::{Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::{Connection, DistanceType};
use tokio::sync::Mutex;

use propgen_core::error::{Error, Result};
use propgen_core::traits::Embedder;
use propgen_core::types::{DocumentChunk, Meta, RankedChunk};

pub mod ann;
pub mod schema;
pub mod store;

use schema::{build_chunks_schema, chunks_to_record_batch, CHUNKS_TABLE};

const META_DIM_KEY: &str = "embedding_dim";
const EMBED_BATCH: usize = 64;
const INSERT_BATCH: usize = 512;

pub struct VectorIndex {
    db: Connection,
    embedder: Arc<dyn Embedder>,
    dim: usize,
    /// Serializes mutations; searches stay reader-parallel because Lance
    /// readers pin a committed dataset version. Shared across every
    /// handle opened at the same path in this process, so two instances
    /// contend on one lock rather than racing at the Lance commit.
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

/// One write lock per index path. Handles opened independently at the
/// same path must serialize through the same lock or the
/// writer-exclusive guarantee holds only within a single instance.
fn write_lock_for(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut map = LOCKS
        .get_or_init(|| StdMutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

impl VectorIndex {
    /// Build a fresh index from `chunks`, fully replacing whatever was
    /// persisted at `path` before. An empty chunk set is refused: an index
    /// that can never answer a search is not a valid index. A non-empty
    /// directory that does not hold an index is refused too, so a
    /// mistyped path never wipes unrelated data.
    pub async fn build(
        path: &Path,
        embedder: Arc<dyn Embedder>,
        chunks: &[DocumentChunk],
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::IndexUnavailable(
                "cannot build an index from zero chunks".to_string(),
            ));
        }
        if path.exists() {
            let lock = write_lock_for(path);
            let _guard = lock.lock().await;
            let holds_index = path.join(format!("{CHUNKS_TABLE}.lance")).exists();
            let is_empty = path.read_dir()?.next().is_none();
            if !holds_index && !is_empty {
                return Err(Error::Store(format!(
                    "refusing to replace {}: directory is not a vector index",
                    path.display()
                )));
            }
            std::fs::remove_dir_all(path)?;
        }
        let index = Self::create_empty(path, embedder).await?;
        let added = index.append_chunks(chunks).await?;
        tracing::info!(chunks = added, path = %path.display(), "vector index built");
        let table = index.chunks_table().await?;
        ann::ensure_ann_index(&table, added, index.dim).await?;
        Ok(index)
    }

    /// Load the index persisted at `path`. Missing state is
    /// `IndexUnavailable`; an embedder of the wrong dimensionality is
    /// `DimensionMismatch` (never silently truncated or padded).
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IndexUnavailable(format!(
                "no index found at {}",
                path.display()
            )));
        }
        let db = store::open_db(path.to_string_lossy().as_ref()).await?;
        if !store::table_exists(&db, CHUNKS_TABLE).await? {
            return Err(Error::IndexUnavailable(format!(
                "{} holds no chunks table",
                path.display()
            )));
        }
        let dim: usize = store::get_meta(&db, META_DIM_KEY)
            .await?
            .ok_or_else(|| Error::Store("index metadata is missing the embedding dimension".to_string()))?
            .parse()
            .map_err(Error::store)?;
        if dim != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedder.dim() });
        }
        Ok(Self { db, embedder, dim, write_lock: write_lock_for(path) })
    }

    /// Open the index, creating an empty one when nothing is persisted yet.
    ///
    /// This recovery exists for the proposal-feedback path only: the first
    /// accepted proposal may legitimately arrive before any corpus rebuild.
    /// Query paths must use [`VectorIndex::open`] so a missing index stays
    /// a hard failure.
    pub async fn open_or_create(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        match Self::open(path, embedder.clone()).await {
            Ok(index) => Ok(index),
            Err(Error::IndexUnavailable(reason)) => {
                tracing::warn!(%reason, "index missing, creating a fresh one");
                Self::create_empty(path, embedder).await
            }
            Err(e) => Err(e),
        }
    }

    async fn create_empty(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let write_lock = write_lock_for(path);
        let db = store::open_db(path.to_string_lossy().as_ref()).await?;
        let dim = embedder.dim();
        {
            let _guard = write_lock.lock().await;
            // Meta first: `open` only trusts the index once the chunks
            // table appears, so a concurrent opener either sees nothing
            // (and recovers here, serialized) or a complete index.
            store::set_meta(&db, META_DIM_KEY, &dim.to_string()).await?;
            store::ensure_table(&db, CHUNKS_TABLE, build_chunks_schema(dim as i32)).await?;
        }
        Ok(Self { db, embedder, dim, write_lock })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self.chunks_table().await?;
        table.count_rows(None).await.map_err(Error::store)
    }

    /// Embed and append new chunks without touching prior entries.
    /// Cost is proportional to the new chunks, not the table size.
    pub async fn add(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.append_chunks(chunks).await
    }

    /// Embed the query and return up to `k` entries, highest cosine
    /// similarity first. Searching an empty index is `IndexUnavailable`,
    /// never an empty success.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RankedChunk>> {
        if self.count().await? == 0 {
            return Err(Error::IndexUnavailable("index holds no entries".to_string()));
        }
        let query_vec = self.embedder.embed(query_text)?;
        let table = self.chunks_table().await?;
        let mut stream = table
            .vector_search(query_vec)
            .map_err(Error::store)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(Error::store)?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let distances = f32_column(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                let chunk = row_to_chunk(&batch, i)?;
                let score = 1.0 - distances.value(i);
                results.push(RankedChunk { chunk, score });
            }
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    async fn chunks_table(&self) -> Result<Table> {
        self.db.open_table(CHUNKS_TABLE).execute().await.map_err(Error::store)
    }

    async fn append_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in texts.chunks(EMBED_BATCH) {
            let vectors = self.embedder.embed_batch(batch)?;
            for v in &vectors {
                if v.len() != self.dim {
                    return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
                }
            }
            pb.inc(batch.len() as u64);
            embeddings.extend(vectors);
        }
        pb.finish_and_clear();

        let table = self.chunks_table().await?;
        let mut offset = 0;
        while offset < chunks.len() {
            let end = (offset + INSERT_BATCH).min(chunks.len());
            let rb = chunks_to_record_batch(&chunks[offset..end], &embeddings[offset..end], self.dim as i32)?;
            let schema = rb.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
            table.add(reader).execute().await.map_err(Error::store)?;
            offset = end;
        }
        tracing::debug!(chunks = chunks.len(), "chunks appended to index");
        Ok(chunks.len())
    }
}

fn str_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Store(format!("column {name} missing or not utf8")))
}

fn i32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::Store(format!("column {name} missing or not int32")))
}

fn f32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::Store(format!("column {name} missing or not float32")))
}

fn row_to_chunk(batch: &RecordBatch, row: usize) -> Result<DocumentChunk> {
    let meta: Meta =
        serde_json::from_str(str_column(batch, "meta_json")?.value(row)).map_err(Error::store)?;
    Ok(DocumentChunk {
        id: str_column(batch, "id")?.value(row).to_string(),
        doc_id: str_column(batch, "doc_id")?.value(row).to_string(),
        source: str_column(batch, "source")?.value(row).to_string(),
        page: i32_column(batch, "page")?.value(row) as usize,
        content: str_column(batch, "content")?.value(row).to_string(),
        chunk_index: i32_column(batch, "chunk_index")?.value(row) as usize,
        total_chunks: i32_column(batch, "total_chunks")?.value(row) as usize,
        meta,
    })
}
