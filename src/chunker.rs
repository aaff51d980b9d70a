//! Recursive separator-hierarchy text splitter.
//!
//! Documents are decomposed along a fixed separator ladder (paragraph break,
//! line break, sentence terminator, space, single characters), always
//! preferring the coarsest separator that keeps a piece within the size
//! bound. Pieces are then merged back into chunks of at most `chunk_size`
//! characters, with consecutive chunks sharing up to `overlap` characters of
//! trailing/leading context so retrieval does not lose cross-boundary
//! meaning.
//!
//! Separators stay attached to the text in front of them and nothing is
//! trimmed, so concatenating the produced chunks with their overlaps removed
//! reproduces the input exactly. Splitting is fully deterministic.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::types::RagError;

/// Separator ladder, coarsest first. Single-character fallback is implicit.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Deterministic character-based text splitter with overlap.
#[derive(Clone, Debug)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Default maximum chunk length, in characters.
    pub const DEFAULT_CHUNK_SIZE: usize = 1024;
    /// Default overlap between consecutive chunks, in characters.
    pub const DEFAULT_OVERLAP: usize = 180;

    /// Creates a chunker producing chunks of at most `chunk_size` characters
    /// with up to `overlap` characters shared between neighbors.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Chunking("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(RagError::Chunking(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Builds a chunker from the configured size and overlap.
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum chunk length, in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap, in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into ordered, non-empty chunks.
    ///
    /// Empty input yields an empty sequence; input within the size bound is
    /// returned as a single chunk equal to the input.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let pieces = self.decompose(text, &SEPARATORS);
        self.merge(pieces)
    }

    /// Recursively splits `text` into pieces of at most `chunk_size`
    /// characters, descending the separator ladder only where needed.
    fn decompose(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        let Some((separator, finer)) = separators.split_first() else {
            return char_groups(text, self.chunk_size);
        };
        if !text.contains(separator) {
            return self.decompose(text, finer);
        }

        let mut pieces = Vec::new();
        for part in text.split_inclusive(separator) {
            if char_len(part) <= self.chunk_size {
                pieces.push(part.to_string());
            } else {
                pieces.extend(self.decompose(part, finer));
            }
        }
        pieces
    }

    /// Greedily packs pieces into chunks, carrying a tail of up to
    /// `overlap` characters into the next chunk.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<String> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(&piece);
            if piece_len == 0 {
                continue;
            }
            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                chunks.push(join_window(&window));
                // Shrink to the overlap tail, dropping further if the next
                // piece still would not fit.
                while window_len > self.overlap
                    || (window_len + piece_len > self.chunk_size && window_len > 0)
                {
                    match window.pop_front() {
                        Some(front) => window_len -= char_len(&front),
                        None => break,
                    }
                }
            }
            window_len += piece_len;
            window.push_back(piece);
        }

        if !window.is_empty() {
            chunks.push(join_window(&window));
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            overlap: Self::DEFAULT_OVERLAP,
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_window(window: &VecDeque<String>) -> String {
    window.iter().flat_map(|piece| piece.chars()).collect()
}

/// Splits `text` into runs of at most `size` characters, respecting char
/// boundaries. Used only when no separator applies.
fn char_groups(text: &str, size: usize) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == size {
            groups.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
