//! Arrow schema for the chunks table.
//!
//! One row per indexed chunk: the full chunk payload travels with its
//! vector so the persisted directory is self-contained. The vector column
//! dimensionality comes from the embedding provider at build time.

use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use propgen_core::error::{Error, Result};
use propgen_core::types::DocumentChunk;

pub const CHUNKS_TABLE: &str = "chunks";
pub const META_TABLE: &str = "meta";

pub fn build_chunks_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::Int32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("total_chunks", DataType::Int32, false),
        Field::new("meta_json", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

/// Pack chunks and their embeddings into one Arrow record batch.
/// Lengths must already be validated by the caller.
pub fn chunks_to_record_batch(
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
    dim: i32,
) -> Result<RecordBatch> {
    let schema = build_chunks_schema(dim);
    let mut ids = Vec::with_capacity(chunks.len());
    let mut doc_ids = Vec::with_capacity(chunks.len());
    let mut sources = Vec::with_capacity(chunks.len());
    let mut pages = Vec::with_capacity(chunks.len());
    let mut contents = Vec::with_capacity(chunks.len());
    let mut chunk_indices = Vec::with_capacity(chunks.len());
    let mut totals = Vec::with_capacity(chunks.len());
    let mut metas = Vec::with_capacity(chunks.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
        ids.push(chunk.id.clone());
        doc_ids.push(chunk.doc_id.clone());
        sources.push(chunk.source.clone());
        pages.push(chunk.page as i32);
        contents.push(chunk.content.clone());
        chunk_indices.push(chunk.chunk_index as i32);
        totals.push(chunk.total_chunks as i32);
        metas.push(serde_json::to_string(&chunk.meta).map_err(Error::store)?);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(Int32Array::from(pages)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(totals)),
            Arc::new(StringArray::from(metas)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                vectors.into_iter(),
                dim,
            )),
        ],
    )
    .map_err(Error::store)
}
