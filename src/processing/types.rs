//! Core data types and error definitions for the processing pipeline.

use crate::{
    completion::CompletionClientError, embedding::EmbeddingClientError, index::IndexError,
    index::SearchHit,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The splitter was configured with an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors raised while wiring the pipeline from configuration.
#[derive(Debug, Error)]
pub enum PipelineInitError {
    /// The splitter settings were rejected.
    #[error("Invalid splitter configuration: {0}")]
    Chunking(#[from] ChunkingError),
    /// The embedding client could not be constructed.
    #[error("Embedding client unavailable: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The completion client could not be constructed.
    #[error("Completion client unavailable: {0}")]
    Completion(#[from] CompletionClientError),
}

/// Errors emitted while building and persisting an index.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The index could not be assembled or written.
    #[error("Failed to persist index: {0}")]
    Index(#[from] IndexError),
    /// Provider returned a different number of vectors than chunks submitted.
    #[error("Embedding provider returned {found} vectors for {expected} chunks")]
    EmbeddingCountMismatch {
        /// Number of chunks submitted.
        expected: usize,
        /// Number of vectors received.
        found: usize,
    },
}

/// Errors emitted while answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The question was empty after trimming.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// The persisted index was missing or unreadable.
    #[error("{0}")]
    Index(#[from] IndexError),
    /// Embedding provider failed to embed the question.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Completion provider failed to produce an answer.
    #[error("Failed to generate answer: {0}")]
    Completion(#[from] CompletionClientError),
}

impl AnswerError {
    /// Whether the failure means no index has been built yet.
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, Self::Index(IndexError::NotFound(_)))
    }
}

/// A bounded segment of extracted document text and its position in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Zero-based position of the chunk in the document.
    pub index: usize,
    /// Chunk contents.
    pub text: String,
}

/// Summary of a completed index build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    /// Number of chunks embedded and stored.
    pub chunk_count: usize,
    /// Chunk size used while splitting.
    pub chunk_size: usize,
    /// Dimensionality of the stored vectors.
    pub dimension: usize,
    /// Location of the persisted index.
    pub index_path: PathBuf,
}

/// Answer produced by the retrieval pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer text.
    pub answer: String,
    /// Chunks supplied to the completion service as context, best match first.
    pub sources: Vec<SearchHit>,
}
