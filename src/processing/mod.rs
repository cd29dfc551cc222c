//! Document processing pipeline: chunking, embedding, index persistence, and answering.

pub mod chunking;
pub mod progress;
mod service;
pub mod types;

pub use progress::{
    CollectingProgress, NoProgress, ProgressEvent, ProgressReporter, StderrProgress,
    TracingProgress,
};
pub use service::{PipelineApi, PipelineService, PipelineSettings};
pub use types::{
    Answer, AnswerError, BuildOutcome, Chunk, ChunkingError, PipelineInitError, ProcessingError,
};
