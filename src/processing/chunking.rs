//! Recursive separator-based text splitting.
//!
//! The splitter walks a prioritized separator list. Text is cut on the first separator that
//! occurs in it, and the resulting pieces are greedily merged back together (joined by that
//! separator) while the merged chunk stays within `chunk_size` characters. A piece that is
//! still too large is split again with the separators that follow; when none apply it is cut
//! at hard character boundaries. Chunks never overlap.
//!
//! Sizes are measured in Unicode scalar values, not bytes.

use super::types::{Chunk, ChunkingError};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Separator priority: paragraph break, line break, sentence period, sentence period.
///
/// The period appears twice. The second entry can never match because pieces produced by the
/// first one no longer contain a period, so it is kept as given without changing output.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", "."];

/// Splits text into ordered, size-bounded chunks.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter with an explicit separator priority list.
    pub fn new(chunk_size: usize, separators: Vec<String>) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            separators,
        })
    }

    /// Create a splitter using [`DEFAULT_SEPARATORS`].
    pub fn with_default_separators(chunk_size: usize) -> Result<Self, ChunkingError> {
        Self::new(
            chunk_size,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into chunk strings in document order.
    ///
    /// Returns an empty vector when the input is all whitespace.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.split_into(text, &self.separators, &mut chunks);
        chunks
    }

    /// Split `text` and number the resulting chunks from zero.
    pub fn split_chunks(&self, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk { index, text })
            .collect()
    }

    fn split_into(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let Some(position) = separators
            .iter()
            .position(|separator| !separator.is_empty() && text.contains(separator.as_str()))
        else {
            self.hard_split(text, out);
            return;
        };
        let separator = separators[position].as_str();
        let remaining = &separators[position + 1..];
        let separator_len = char_len(separator);

        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in text.split(separator) {
            if piece.trim().is_empty() {
                continue;
            }
            let piece_len = char_len(piece);

            if piece_len > self.chunk_size {
                flush(&mut current, &mut current_len, out);
                self.split_into(piece, remaining, out);
                continue;
            }

            let joined_len = if current.is_empty() {
                piece_len
            } else {
                current_len + separator_len + piece_len
            };

            if joined_len > self.chunk_size {
                flush(&mut current, &mut current_len, out);
                current.push_str(piece);
                current_len = piece_len;
            } else {
                if !current.is_empty() {
                    current.push_str(separator);
                }
                current.push_str(piece);
                current_len = joined_len;
            }
        }

        flush(&mut current, &mut current_len, out);
    }

    fn hard_split(&self, text: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = text.chars().collect();
        for window in chars.chunks(self.chunk_size) {
            let piece: String = window.iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
    }
}

fn flush(current: &mut String, current_len: &mut usize, out: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
    *current_len = 0;
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
