//! Flat vector index over document chunks.
//!
//! The index stores every chunk with its embedding and answers queries with an exhaustive
//! cosine-similarity scan. Documents handled by the assistant produce at most a few thousand
//! chunks, so a linear scan stays well within interactive latency.

pub mod store;
pub mod types;

pub use store::{INDEX_FILE_NAME, IndexStore};
pub use types::{INDEX_FORMAT_VERSION, IndexEntry, IndexError, SearchHit, StoredIndex};

use crate::processing::types::Chunk;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// In-memory index of chunk embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    built_at: String,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair chunks with their vectors. Both slices must be non-empty, equally long, and every
    /// vector must share one dimension.
    pub fn build(
        model: impl Into<String>,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }
        if chunks.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                expected: chunks.len(),
                found: vectors.len(),
            });
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(IndexError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }

        let entries = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                if vector.len() != dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimension,
                        found: vector.len(),
                    });
                }
                Ok(IndexEntry {
                    index: chunk.index,
                    text: chunk.text.clone(),
                    chunk_hash: compute_chunk_hash(&chunk.text),
                    vector,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model: model.into(),
            dimension,
            built_at: current_timestamp_rfc3339(),
            entries,
        })
    }

    /// Rebuild an index from its serialized form, re-checking version and dimensions.
    pub fn from_stored(stored: StoredIndex) -> Result<Self, IndexError> {
        if stored.version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(stored.version));
        }
        if stored.entries.is_empty() {
            return Err(IndexError::Empty);
        }
        if let Some(entry) = stored
            .entries
            .iter()
            .find(|entry| entry.vector.len() != stored.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: stored.dimension,
                found: entry.vector.len(),
            });
        }
        Ok(Self {
            model: stored.model,
            dimension: stored.dimension,
            built_at: stored.built_at,
            entries: stored.entries,
        })
    }

    /// Serializable snapshot of this index.
    pub fn to_stored(&self) -> StoredIndex {
        StoredIndex {
            version: INDEX_FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            built_at: self.built_at.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Reject queries embedded with a different model than the stored vectors.
    pub fn ensure_model(&self, model: &str) -> Result<(), IndexError> {
        if self.model != model {
            return Err(IndexError::ModelMismatch {
                index: self.model.clone(),
                query: model.to_string(),
            });
        }
        Ok(())
    }

    /// Return up to `k` chunks ordered by descending similarity; ties keep chunk order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.vector), entry))
            .collect();
        // Stable sort keeps document order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| SearchHit {
                index: entry.index,
                text: entry.text.clone(),
                score,
            })
            .collect())
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks. Built indexes are never empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding model recorded at build time.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stored entries in chunk order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Cosine similarity between two equally sized vectors. Zero vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
