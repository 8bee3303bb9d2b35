//! Prompt templates for proposal drafting.
//!
//! Two variants: the grounded template feeding retrieved context to the
//! backend, and a degraded template used when no index is available. Both
//! instruct the model to write a structured commercial proposal rather
//! than a free-form answer.

/// Grounded proposal prompt: `context` is the assembled retrieval block,
/// `question` is the client brief.
pub fn proposal_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a senior consultant drafting a commercial proposal.\n\
         Use the reference material below, drawn from past proposals and\n\
         internal documentation, to ground your answer. Reuse its\n\
         terminology, structure, and service descriptions where relevant.\n\
         Do not invent offerings that the reference material does not\n\
         support.\n\n\
         Reference material:\n\
         {context}\n\n\
         Client brief:\n\
         {question}\n\n\
         Write a structured proposal with these sections: context and\n\
         objectives, proposed approach, deliverables, timeline, and team.\n\
         Keep the tone professional and specific."
    )
}

/// Ungrounded fallback used when retrieval is unavailable. The model only
/// has the brief to work from, which the caller must treat as a weaker
/// draft.
pub fn baseline_prompt(question: &str) -> String {
    format!(
        "You are a senior consultant drafting a commercial proposal.\n\
         No reference material is available; rely on general consulting\n\
         practice only.\n\n\
         Client brief:\n\
         {question}\n\n\
         Write a structured proposal with these sections: context and\n\
         objectives, proposed approach, deliverables, timeline, and team.\n\
         Keep the tone professional and specific."
    )
}
