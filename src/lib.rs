#![deny(missing_docs)]

//! Core library for the SmartDoc document question-answering assistant.

/// HTTP routing and REST handlers.
pub mod api;
/// Text completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from uploaded documents.
pub mod extraction;
/// Persisted vector index over document chunks.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Processing and answering counters.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Chat session state and message log.
pub mod session;
