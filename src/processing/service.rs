//! Pipeline service coordinating chunking, embedding, index persistence, and answering.

use crate::{
    completion::{CompletionClient, CompletionRequest, build_qa_prompt, get_completion_client},
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client},
    index::{IndexStore, VectorIndex},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::RecursiveSplitter,
        progress::{ProgressEvent, ProgressReporter},
        types::{Answer, AnswerError, BuildOutcome, Chunk, PipelineInitError, ProcessingError},
    },
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Tunables applied to every build and question.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Token budget for answers.
    pub max_tokens: u32,
    /// Directory of the single index slot.
    pub index_path: PathBuf,
}

impl PipelineSettings {
    /// Extract the pipeline tunables from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            top_k: config.retrieval_top_k,
            temperature: config.completion_temperature,
            max_tokens: config.completion_max_tokens,
            index_path: config.index_path.clone(),
        }
    }
}

/// Abstraction over the pipeline used by the shells (CLI, HTTP, session).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Split `text`, embed every chunk, and replace the persisted index.
    async fn build_index(
        &self,
        text: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<BuildOutcome, ProcessingError>;

    /// Answer `question` from the persisted index.
    async fn answer(&self, question: &str) -> Result<Answer, AnswerError>;

    /// Whether a persisted index is available for questions.
    fn index_available(&self) -> bool;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the embedding and completion clients plus the single index slot.
///
/// Construct once near process start and share through an `Arc`. The index is re-read from disk
/// for every question so that a rebuild is visible immediately.
pub struct PipelineService {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    completion_client: Box<dyn CompletionClient + Send + Sync>,
    splitter: RecursiveSplitter,
    store: IndexStore,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        completion_client: Box<dyn CompletionClient + Send + Sync>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineInitError> {
        let splitter = RecursiveSplitter::with_default_separators(settings.chunk_size)?;
        Ok(Self {
            embedding_client,
            completion_client,
            splitter,
            store: IndexStore::new(settings.index_path.clone()),
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Build a service with the providers selected by `config`.
    pub fn from_config(config: &Config) -> Result<Self, PipelineInitError> {
        tracing::info!(provider = ?config.embedding_provider, "Initializing embedding client");
        let embedding_client = get_embedding_client(config)?;
        tracing::info!(provider = ?config.completion_provider, "Initializing completion client");
        let completion_client = get_completion_client(config)?;
        Self::new(
            embedding_client,
            completion_client,
            PipelineSettings::from_config(config),
        )
    }

    /// Shared handle to the metrics registry.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Index store backing this service.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Embed pre-split chunks and replace the persisted index.
    ///
    /// The previous index stays on disk unless every chunk was embedded and the new index was
    /// written completely.
    pub async fn build_from_chunks(
        &self,
        chunks: Vec<Chunk>,
        reporter: &dyn ProgressReporter,
    ) -> Result<BuildOutcome, ProcessingError> {
        let chunk_count = chunks.len();
        reporter.report(ProgressEvent::EmbeddingInProgress {
            chunks: chunk_count,
        });

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedding_client.generate_embeddings(texts).await?
        };
        if vectors.len() != chunk_count {
            return Err(ProcessingError::EmbeddingCountMismatch {
                expected: chunk_count,
                found: vectors.len(),
            });
        }

        let index = VectorIndex::build(self.embedding_client.model(), &chunks, vectors)?;
        self.store.save(&index)?;

        self.metrics.record_document(chunk_count as u64);
        reporter.report(ProgressEvent::IndexSaved {
            path: self.store.dir().to_path_buf(),
            chunks: chunk_count,
        });
        tracing::info!(
            chunks = chunk_count,
            dimension = index.dimension(),
            model = index.model(),
            path = %self.store.dir().display(),
            "Index built"
        );

        Ok(BuildOutcome {
            chunk_count,
            chunk_size: self.splitter.chunk_size(),
            dimension: index.dimension(),
            index_path: self.store.dir().to_path_buf(),
        })
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn build_index(
        &self,
        text: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<BuildOutcome, ProcessingError> {
        reporter.report(ProgressEvent::LoadingStarted);
        tracing::info!(chars = text.chars().count(), "Processing document");

        reporter.report(ProgressEvent::SplittingStarted);
        let chunks = self.splitter.split_chunks(text);
        tracing::debug!(
            chunks = chunks.len(),
            chunk_size = self.splitter.chunk_size(),
            "Split document"
        );

        self.build_from_chunks(chunks, reporter).await
    }

    async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let index = self.store.load()?;
        index.ensure_model(self.embedding_client.model())?;
        let query = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("no embedding returned for question".into())
            })?;

        let sources = index.search(&query, self.settings.top_k)?;
        let context: Vec<&str> = sources.iter().map(|hit| hit.text.as_str()).collect();
        let prompt = build_qa_prompt(&context, question);
        tracing::debug!(
            retrieved = sources.len(),
            top_k = self.settings.top_k,
            "Retrieved context"
        );

        let answer = self
            .completion_client
            .complete(CompletionRequest {
                prompt,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .await?;

        self.metrics.record_answer();
        tracing::info!(retrieved = sources.len(), "Question answered");
        Ok(Answer { answer, sources })
    }

    fn index_available(&self) -> bool {
        self.store.exists()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionClientError;
    use crate::embedding::HashingEmbeddingClient;
    use crate::index::IndexError;
    use crate::processing::progress::CollectingProgress;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingCompletion {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            self.prompts.lock().unwrap().push(request.prompt);
            Ok("stub answer".into())
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedding {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Err(EmbeddingClientError::ProviderUnavailable("offline".into()))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    struct ShortEmbedding;

    #[async_trait]
    impl EmbeddingClient for ShortEmbedding {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(vec![vec![1.0, 0.0]])
        }

        fn model(&self) -> &str {
            "short"
        }
    }

    /// Produces hashing vectors under another model's name.
    struct RenamedEmbedding(HashingEmbeddingClient);

    #[async_trait]
    impl EmbeddingClient for RenamedEmbedding {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.0.generate_embeddings(texts).await
        }

        fn model(&self) -> &str {
            "text-embedding-3-small"
        }
    }

    fn settings(dir: &std::path::Path, chunk_size: usize) -> PipelineSettings {
        PipelineSettings {
            chunk_size,
            top_k: 4,
            temperature: 0.7,
            max_tokens: 500,
            index_path: dir.join("index_store"),
        }
    }

    fn hashing_service(
        dir: &std::path::Path,
        chunk_size: usize,
    ) -> (PipelineService, Arc<Mutex<Vec<String>>>) {
        let completion = RecordingCompletion::default();
        let prompts = Arc::clone(&completion.prompts);
        let service = PipelineService::new(
            Box::new(HashingEmbeddingClient::default()),
            Box::new(completion),
            settings(dir, chunk_size),
        )
        .expect("service");
        (service, prompts)
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = PipelineService::new(
            Box::new(HashingEmbeddingClient::default()),
            Box::new(RecordingCompletion::default()),
            settings(dir.path(), 0),
        );
        assert!(matches!(result, Err(PipelineInitError::Chunking(_))));
    }

    #[tokio::test]
    async fn build_emits_stages_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = hashing_service(dir.path(), 40);
        let progress = CollectingProgress::new();

        let outcome = service
            .build_index(
                "Alpha paragraph.\n\nBeta paragraph.\n\nGamma paragraph that is longer.",
                &progress,
            )
            .await
            .expect("build");

        let events = progress.events();
        assert_eq!(events[0], ProgressEvent::LoadingStarted);
        assert_eq!(events[1], ProgressEvent::SplittingStarted);
        assert_eq!(
            events[2],
            ProgressEvent::EmbeddingInProgress {
                chunks: outcome.chunk_count
            }
        );
        assert!(
            matches!(events[3], ProgressEvent::IndexSaved { chunks, .. } if chunks == outcome.chunk_count)
        );
        assert_eq!(events.len(), 4);
        assert!(service.index_available());
        assert_eq!(service.metrics_snapshot().documents_processed, 1);
    }

    #[tokio::test]
    async fn answer_before_build_is_index_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, prompts) = hashing_service(dir.path(), 100);

        let error = service.answer("anything?").await.expect_err("no index");
        assert!(error.is_index_not_found());
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = hashing_service(dir.path(), 100);
        assert!(matches!(
            service.answer("   ").await,
            Err(AnswerError::EmptyQuestion)
        ));
    }

    #[tokio::test]
    async fn answer_sends_retrieved_context_to_completion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, prompts) = hashing_service(dir.path(), 60);
        service
            .build_index(
                "The warehouse opens at seven in the morning.\n\nPenguins huddle together for warmth.\n\nInvoices are payable within thirty days.",
                &CollectingProgress::new(),
            )
            .await
            .expect("build");

        let answer = service
            .answer("When are invoices payable?")
            .await
            .expect("answer");

        assert_eq!(answer.answer, "stub answer");
        assert_eq!(answer.sources.len(), 3);
        assert_eq!(
            answer.sources[0].text,
            "Invoices are payable within thirty days."
        );
        let prompts = prompts.lock().unwrap();
        assert!(prompts[0].contains("Invoices are payable within thirty days."));
        assert!(prompts[0].contains("Question: When are invoices payable?"));
        assert_eq!(service.metrics_snapshot().questions_answered, 1);
    }

    #[tokio::test]
    async fn embedding_failure_propagates_and_keeps_prior_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = hashing_service(dir.path(), 100);
        service
            .build_index("original content", &CollectingProgress::new())
            .await
            .expect("first build");

        let failing = PipelineService::new(
            Box::new(FailingEmbedding),
            Box::new(RecordingCompletion::default()),
            settings(dir.path(), 100),
        )
        .expect("service");
        let error = failing
            .build_index("replacement content", &CollectingProgress::new())
            .await
            .expect_err("embedding failure");
        assert!(matches!(error, ProcessingError::Embedding(_)));

        let index = service.store().load().expect("prior index");
        assert_eq!(index.entries()[0].text, "original content");
    }

    #[tokio::test]
    async fn vector_count_mismatch_fails_the_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = PipelineService::new(
            Box::new(ShortEmbedding),
            Box::new(RecordingCompletion::default()),
            settings(dir.path(), 5),
        )
        .expect("service");

        let error = service
            .build_index("one\n\ntwo\n\nthree", &CollectingProgress::new())
            .await
            .expect_err("mismatch");
        assert!(matches!(
            error,
            ProcessingError::EmbeddingCountMismatch {
                expected: 3,
                found: 1
            }
        ));
        assert!(!service.index_available());
    }

    #[tokio::test]
    async fn index_from_another_embedding_model_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (builder, _) = hashing_service(dir.path(), 100);
        builder
            .build_index("The ferry departs at nine.", &CollectingProgress::new())
            .await
            .expect("build");

        let completion = RecordingCompletion::default();
        let prompts = Arc::clone(&completion.prompts);
        let service = PipelineService::new(
            Box::new(RenamedEmbedding(HashingEmbeddingClient::default())),
            Box::new(completion),
            settings(dir.path(), 100),
        )
        .expect("service");

        let error = service
            .answer("When does the ferry depart?")
            .await
            .expect_err("model mismatch");
        assert!(matches!(
            error,
            AnswerError::Index(IndexError::ModelMismatch { ref index, ref query })
                if index == "feature-hash" && query == "text-embedding-3-small"
        ));
        assert!(prompts.lock().unwrap().is_empty());
        assert_eq!(service.metrics_snapshot().questions_answered, 0);
    }

    #[tokio::test]
    async fn whitespace_text_cannot_build_an_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = hashing_service(dir.path(), 100);
        let error = service
            .build_index(" \n\n ", &CollectingProgress::new())
            .await
            .expect_err("empty");
        assert!(matches!(error, ProcessingError::Index(IndexError::Empty)));
    }
}
