//! Corpus loading: recursive directory scan into [`SourceDocument`]s.
//!
//! Plain-text files (`.txt`, `.md`) are the ingestion contract; richer
//! formats (PDF decks and the like) are converted upstream by external
//! collaborators. Files are visited in sorted order so ingestion is
//! deterministic.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::SourceDocument;

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub fn load_directory(data_dir: &Path) -> Result<Vec<SourceDocument>> {
    let files = list_text_files(data_dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %data_dir.display(), "no text files found");
        return Ok(Vec::new());
    }
    let mut documents = Vec::with_capacity(files.len());
    for file_path in &files {
        documents.push(load_file(file_path)?);
    }
    tracing::info!(files = files.len(), "corpus loaded");
    Ok(documents)
}

pub fn load_file(file_path: &Path) -> Result<SourceDocument> {
    let text = read_file_content(file_path)?;
    let doc_id = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string_lossy().to_string());
    let source = file_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| doc_id.clone());
    Ok(SourceDocument::new(doc_id, source, text))
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        // Tolerate non-UTF8 bytes in otherwise textual files.
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_text_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        // An unreadable directory or file must fail the load, not
        // silently shrink the corpus.
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if TEXT_EXTENSIONS.contains(&ext) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
