//! Overlapping word-window chunker.
//!
//! Splits normalized document text into fixed-size windows of words, each a
//! retrievable unit. Successive windows start every `window − overlap`
//! words, so adjacent chunks share `overlap` words of context.
//!
//! Each chunk receives a deterministic id derived from its document id and
//! window index, so ids are stable and reconstructible across save/reload.
//!
//! # Algorithm
//!
//! 1. Split text on Unicode whitespace into a word sequence.
//! 2. Emit windows of `window` words starting every `window − overlap`
//!    words; the final window may be shorter.
//! 3. Fewer than `window` words → exactly one chunk holding the whole text.
//! 4. No words at all → zero chunks (the caller treats this as an
//!    empty-content ingest failure).
//!
//! # Example
//!
//! ```rust
//! use knowledge_store_core::chunk::chunk_words;
//!
//! let chunks = chunk_words("doc-1", "just a few words", 500, 50);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "doc-1-0");
//! ```

use std::collections::BTreeMap;

use crate::models::Chunk;

/// Default window size in words.
pub const DEFAULT_WINDOW_WORDS: usize = 500;
/// Default overlap between successive windows, in words.
pub const DEFAULT_OVERLAP_WORDS: usize = 50;

/// Split text into the raw window strings, without building [`Chunk`]s.
///
/// Exposed separately so callers can embed window texts before the parent
/// document id is assigned. `overlap` values `>= window` are clamped so the
/// start step is always at least one word.
pub fn split_windows(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || window == 0 {
        return Vec::new();
    }

    let step = window.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Split text into [`Chunk`]s with contiguous indices starting at 0.
///
/// # Guarantees
///
/// - Chunk ids are `{document_id}-{index}`, stable for a given document.
/// - Indices are contiguous: `0, 1, 2, …, N-1`.
/// - Re-concatenating each chunk's words past the shared `overlap` prefix
///   reproduces the original word sequence.
/// - Whitespace-only input yields zero chunks.
pub fn chunk_words(document_id: &str, text: &str, window: usize, overlap: usize) -> Vec<Chunk> {
    split_windows(text, window, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: format!("{}-{}", document_id, index),
            document_id: document_id.to_string(),
            chunk_index: index,
            text,
            metadata: BTreeMap::new(),
            embedding: None,
        })
        .collect()
}
