use thiserror::Error;

/// Failure taxonomy shared by every pipeline stage.
///
/// Each variant carries enough context for the caller to tell a retrieval
/// problem from a generation problem. Stages never substitute empty output
/// for a failure; the one silent degradation (reranking an empty candidate
/// pool) is not an error at all.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedding provider could not encode the given text.
    #[error("embedding failed during {stage}: {reason}")]
    Embedding { stage: &'static str, reason: String },

    /// Search was requested against a missing, corrupt, or empty index.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// A vector of the wrong dimensionality was offered to the index.
    #[error("embedding dimension mismatch: index holds {expected}-d vectors, got {actual}-d")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The cross-encoder scorer failed or answered incoherently.
    /// An empty candidate pool is not an error; it reranks to nothing.
    #[error("reranking failed: {0}")]
    Rerank(String),

    /// The generation backend failed or returned an empty completion.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Index storage layer (LanceDB/Arrow) error.
    #[error("index storage error: {0}")]
    Store(String),

    /// The caller-supplied deadline elapsed before the pipeline finished.
    #[error("pipeline timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any storage-layer error into [`Error::Store`].
    pub fn store<E: std::fmt::Display>(e: E) -> Self {
        Error::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
