//! Domain types shared by the ingestion, index, rerank, and generation layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// Metadata key holding the cross-encoder score the reranker attaches
/// to each surviving chunk.
pub const META_RERANK_SCORE: &str = "rerank_score";
/// `source` value marking documents produced by the feedback loop.
pub const SOURCE_GENERATED: &str = "generated";

/// A unit of ingested content: one text file, or one accepted proposal.
///
/// Immutable once indexed, except for metadata enrichment at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable document identity (file stem, or a timestamped id for
    /// generated proposals).
    pub doc_id: String,
    /// Source identifier shown to users, typically the file name.
    pub source: String,
    /// Page number within the source; 0 for whole-file loads.
    pub page: usize,
    /// The raw text content.
    pub text: String,
    /// RFC 3339 timestamp, set only for system-generated documents.
    pub generated_at: Option<String>,
    /// Free-form key/value metadata; keys are unique per document.
    pub extra: Meta,
}

impl SourceDocument {
    pub fn new(doc_id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            source: source.into(),
            page: 0,
            text: text.into(),
            generated_at: None,
            extra: Meta::new(),
        }
    }
}

/// A bounded segment of a [`SourceDocument`], the unit of indexing.
///
/// `content` never exceeds the chunker's configured size; adjacent chunks
/// of the same document share an overlapping suffix/prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Globally unique chunk identifier: `"{doc_id}:{chunk_index}"`.
    pub id: ChunkId,
    pub doc_id: String,
    pub source: String,
    pub page: usize,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Inherited from the parent document; the reranker adds
    /// [`META_RERANK_SCORE`] here.
    pub meta: Meta,
}

/// A chunk paired with a relevance score.
///
/// The score domain depends on the stage that produced it: the vector
/// index yields cosine similarities (`1 - distance`, not comparable
/// across queries), the reranker yields min-max normalized cross-encoder
/// scores in [0, 1] that keyword boosting may push above 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}
