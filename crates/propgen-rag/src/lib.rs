//! Retrieval-augmented proposal drafting.
//!
//! Wires the ingestion, vector-index, rerank, and generation crates into
//! one pipeline: rebuild the index from a corpus directory, draft a
//! grounded proposal for a client brief, and feed accepted proposals back
//! into the index.

pub mod context;
pub mod evaluate;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use pipeline::{PipelineOutcome, ProposalPipeline};
