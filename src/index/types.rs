//! Shared types used by the vector index and its on-disk store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// On-disk format version written into every index file.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Errors returned while building, persisting, or querying the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No index has been built at the configured location.
    #[error("No index found at {}; process a document first", .0.display())]
    NotFound(PathBuf),
    /// Filesystem access failed.
    #[error("Index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The index file could not be encoded or decoded.
    #[error("Index serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Vectors with different lengths were mixed in one index or query.
    #[error("Vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension established by the index.
        expected: usize,
        /// Dimension of the offending vector.
        found: usize,
    },
    /// The number of vectors did not match the number of chunks.
    #[error("Expected {expected} vectors for the chunks, received {found}")]
    CountMismatch {
        /// Number of chunks.
        expected: usize,
        /// Number of vectors supplied.
        found: usize,
    },
    /// An index with no entries cannot be built.
    #[error("Cannot build an index without chunks")]
    Empty,
    /// The index file was written in a format this build cannot read.
    #[error("Unsupported index format version {0}; process the document again")]
    UnsupportedVersion(u32),
    /// The index was built with a different embedding model than the one answering queries.
    #[error(
        "Index was built with embedding model '{index}' but queries use '{query}'; process the document again"
    )]
    ModelMismatch {
        /// Model recorded in the index.
        index: String,
        /// Model of the configured embedding client.
        query: String,
    },
}

/// One stored chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Position of the chunk in the source document.
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// SHA-256 of the chunk text.
    pub chunk_hash: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

/// Serialized form of a complete index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIndex {
    /// Format version.
    pub version: u32,
    /// Embedding model that produced the vectors.
    pub model: String,
    /// Vector dimensionality shared by every entry.
    pub dimension: usize,
    /// RFC3339 build timestamp.
    pub built_at: String,
    /// Entries in chunk order.
    pub entries: Vec<IndexEntry>,
}

/// Chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Position of the chunk in the source document.
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// Cosine similarity to the query.
    pub score: f32,
}
