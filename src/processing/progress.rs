//! Stage progress reporting for index builds.
//!
//! The index builder emits a [`ProgressEvent`] as it enters each stage so any shell (CLI,
//! HTTP, or a UI) can render status lines. Human output goes to **stderr** so stdout stays
//! reserved for answers.

use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// A single progress event emitted while processing a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Document text is loaded and processing started.
    LoadingStarted,
    /// Text splitting started.
    SplittingStarted,
    /// Chunks are being embedded and the index assembled.
    EmbeddingInProgress {
        /// Number of chunks being embedded.
        chunks: usize,
    },
    /// The index has been written to disk.
    IndexSaved {
        /// Directory holding the index.
        path: PathBuf,
        /// Number of chunks stored.
        chunks: usize,
    },
}

impl ProgressEvent {
    /// Human-readable status line for this stage.
    pub fn message(&self) -> String {
        match self {
            Self::LoadingStarted => "Data loading... started".to_string(),
            Self::SplittingStarted => "Text splitter... started".to_string(),
            Self::EmbeddingInProgress { chunks } => {
                format!("Embedding vector index build in progress ({chunks} chunks)")
            }
            Self::IndexSaved { path, chunks } => {
                format!("Embedding index saved to {} ({chunks} chunks)", path.display())
            }
        }
    }
}

/// Receives progress events from the pipeline.
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress lines on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", event.message());
        let _ = stderr.flush();
    }
}

/// Progress routed into the tracing subscriber.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        tracing::info!(stage = ?event, "{}", event.message());
    }
}

/// Forwards every event to both reporters, first then second.
impl<A, B> ProgressReporter for (A, B)
where
    A: ProgressReporter,
    B: ProgressReporter,
{
    fn report(&self, event: ProgressEvent) {
        self.0.report(event.clone());
        self.1.report(event);
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event so callers can return them after the build finishes.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_keeps_order() {
        let collector = CollectingProgress::new();
        collector.report(ProgressEvent::LoadingStarted);
        collector.report(ProgressEvent::SplittingStarted);
        assert_eq!(
            collector.events(),
            vec![ProgressEvent::LoadingStarted, ProgressEvent::SplittingStarted]
        );
    }

    #[test]
    fn paired_reporters_both_receive_events() {
        let pair = (CollectingProgress::new(), CollectingProgress::new());
        pair.report(ProgressEvent::EmbeddingInProgress { chunks: 2 });
        pair.report(ProgressEvent::SplittingStarted);
        assert_eq!(pair.0.events(), pair.1.events());
        assert_eq!(pair.0.events().len(), 2);

        let logged = (CollectingProgress::new(), TracingProgress);
        logged.report(ProgressEvent::LoadingStarted);
        assert_eq!(logged.0.events(), vec![ProgressEvent::LoadingStarted]);
    }

    #[test]
    fn events_serialize_with_stage_tag() {
        let value = serde_json::to_value(ProgressEvent::EmbeddingInProgress { chunks: 3 })
            .expect("serializable");
        assert_eq!(value["stage"], "embedding_in_progress");
        assert_eq!(value["chunks"], 3);
    }

    #[test]
    fn messages_mention_counts() {
        let saved = ProgressEvent::IndexSaved {
            path: PathBuf::from("index_store"),
            chunks: 7,
        };
        assert!(saved.message().contains("index_store"));
        assert!(saved.message().contains('7'));
    }
}
