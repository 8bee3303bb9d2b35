//! Recursive character chunker.
//!
//! Splits documents into overlapping segments bounded by a maximum
//! character count. Boundaries prefer paragraph breaks, then single
//! newlines, then sentence terminators, then spaces, falling back to a
//! hard character cut. Adjacent chunks of the same document overlap by a
//! configured number of characters so retrieval keeps cross-boundary
//! context.

use crate::error::{Error, Result};
use crate::types::{DocumentChunk, SourceDocument};

/// Boundary preference, coarsest first. Anything still too large after
/// the last separator is cut at a fixed character count.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", " "];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

    /// Invariant: `chunk_overlap < chunk_size`, both counted in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            chunks.extend(self.split_document(doc));
        }
        chunks
    }

    /// An empty document yields zero chunks.
    pub fn split_document(&self, doc: &SourceDocument) -> Vec<DocumentChunk> {
        let pieces = self.split_text(&doc.text);
        let total = pieces.len();
        let mut meta = doc.extra.clone();
        if let Some(ts) = &doc.generated_at {
            meta.insert("generated_at".to_string(), ts.clone());
        }
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| DocumentChunk {
                id: format!("{}:{}", doc.doc_id, i),
                doc_id: doc.doc_id.clone(),
                source: doc.source.clone(),
                page: doc.page,
                content,
                chunk_index: i,
                total_chunks: total,
                meta: meta.clone(),
            })
            .collect()
    }

    /// Split raw text into overlapping pieces of at most `chunk_size`
    /// characters each.
    ///
    /// Segmentation keeps separators attached to the preceding segment, so
    /// concatenating the pieces (with each piece's leading overlap removed)
    /// reconstructs the input text.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        // Segments are capped below chunk_size so a continuation chunk
        // always fits its overlap prefix plus at least one segment.
        let body = self.chunk_size - self.chunk_overlap;
        let segments = segment(text, &SEPARATORS, body);

        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        for seg in segments {
            let seg_len = char_len(&seg);
            if current_len > 0 && current_len + seg_len > self.chunk_size {
                let overlap = tail_chars(&current, self.chunk_overlap);
                pieces.push(std::mem::take(&mut current));
                current_len = char_len(&overlap);
                current = overlap;
            }
            current.push_str(&seg);
            current_len += seg_len;
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces.retain(|p| !p.trim().is_empty());
        pieces
    }
}

/// Recursively break `text` into segments of at most `max` characters,
/// trying each separator in priority order before hard-cutting.
fn segment(text: &str, separators: &[&str], max: usize) -> Vec<String> {
    if char_len(text) <= max {
        return vec![text.to_string()];
    }
    for (i, sep) in separators.iter().enumerate() {
        if text.contains(sep) {
            let finer = &separators[i + 1..];
            let mut out = Vec::new();
            for part in split_keep_separator(text, sep) {
                if char_len(part) <= max {
                    out.push(part.to_string());
                } else {
                    out.extend(segment(part, finer, max));
                }
            }
            return out;
        }
    }
    hard_cut(text, max)
}

/// Split on `sep`, keeping the separator at the end of each part so the
/// parts concatenate back to the input.
fn split_keep_separator<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(sep) {
        let end = start + pos + sep.len();
        parts.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

fn hard_cut(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`, or all of it when shorter.
fn tail_chars(s: &str, n: usize) -> String {
    let count = char_len(s);
    if count <= n {
        return s.to_string();
    }
    s.chars().skip(count - n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_split_keeps_text() {
        let parts = split_keep_separator("a.b.c", ".");
        assert_eq!(parts, vec!["a.", "b.", "c"]);
        assert_eq!(parts.concat(), "a.b.c");
    }

    #[test]
    fn overlap_must_stay_below_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 20).is_ok());
    }

    #[test]
    fn small_text_is_a_single_piece() {
        let chunker = Chunker::default();
        let pieces = chunker.split_text("Skillia delivers AI security audits for public banks.");
        assert_eq!(pieces.len(), 1);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        let chunker = Chunker::default();
        assert!(chunker.split_text("  \n\n  ").is_empty());
    }
}
