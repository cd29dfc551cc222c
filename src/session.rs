//! Chat session: the uploaded document, the session state, and the message log.
//!
//! A session moves `Idle → DocumentReady → IndexReady` and then stays in `IndexReady` while
//! questions are asked. Every question is answered on its own; earlier turns are kept for
//! display only and are never sent to the completion service.

use crate::extraction::{Document, TextExtractor};
use crate::processing::{
    AnswerError, BuildOutcome, PipelineApi, ProcessingError, ProgressReporter,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by session actions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Processing was requested before any document was uploaded.
    #[error("No document uploaded; upload a document before processing")]
    NoUploadedDocument,
    /// The index build failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    /// The question could not be answered.
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing uploaded yet.
    Idle,
    /// A document is uploaded but not yet indexed.
    DocumentReady,
    /// An index has been built in this session.
    IndexReady,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The assistant answering them.
    Assistant,
}

/// One entry of the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Extracted form of the most recent upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedDocument {
    /// Original file name, when supplied.
    pub file_name: Option<String>,
    /// Declared MIME type.
    pub content_type: String,
    /// Extracted text; empty for unsupported or unreadable input.
    pub text: String,
}

impl UploadedDocument {
    /// Run `extractor` over `document`. Blocks while PDF parsing or conversion runs.
    pub fn extract(extractor: &TextExtractor, document: Document) -> Self {
        let text = extractor.extract(&document);
        Self {
            file_name: document.file_name,
            content_type: document.content_type,
            text,
        }
    }

    /// Whether extraction produced anything worth indexing.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Result of a process action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A new index replaced the previous one.
    Indexed(BuildOutcome),
    /// The upload had no extractable text, so the index was left alone.
    NothingToIndex,
}

/// A single user's interaction with the assistant.
pub struct ChatSession {
    extractor: TextExtractor,
    state: SessionState,
    document: Option<UploadedDocument>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start an idle session.
    pub fn new(extractor: TextExtractor) -> Self {
        Self {
            extractor,
            state: SessionState::Idle,
            document: None,
            messages: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent upload, if any.
    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    /// Chat log in the order messages were added.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Extractor used for uploads, for callers that extract outside the session.
    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    /// Extract text from `document` and make it the session's current upload.
    ///
    /// Extraction never fails; unsupported input is stored with empty text.
    pub fn upload(&mut self, document: Document) -> &UploadedDocument {
        let uploaded = UploadedDocument::extract(&self.extractor, document);
        self.accept(uploaded)
    }

    /// Make an already extracted document the session's current upload.
    pub fn accept(&mut self, uploaded: UploadedDocument) -> &UploadedDocument {
        tracing::info!(
            file_name = uploaded.file_name.as_deref().unwrap_or("<unnamed>"),
            content_type = %uploaded.content_type,
            chars = uploaded.text.chars().count(),
            "Document uploaded"
        );
        self.messages.clear();
        self.state = SessionState::DocumentReady;
        self.document.insert(uploaded)
    }

    /// Build the index from the current upload.
    pub async fn process(
        &mut self,
        pipeline: &dyn PipelineApi,
        reporter: &dyn ProgressReporter,
    ) -> Result<ProcessOutcome, SessionError> {
        let Some(document) = self.document.as_ref() else {
            return Err(SessionError::NoUploadedDocument);
        };
        self.messages.clear();

        if !document.has_content() {
            tracing::info!("Uploaded document has no text; index left unchanged");
            return Ok(ProcessOutcome::NothingToIndex);
        }

        let outcome = pipeline.build_index(&document.text, reporter).await?;
        self.state = SessionState::IndexReady;
        Ok(ProcessOutcome::Indexed(outcome))
    }

    /// Ask a question and record both sides of the exchange.
    ///
    /// When answering fails the user message stays in the log and no assistant message is
    /// added. Blank questions are rejected without touching the log.
    pub async fn ask(
        &mut self,
        pipeline: &dyn PipelineApi,
        question: &str,
    ) -> Result<String, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion.into());
        }

        self.messages.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
        });
        let answer = pipeline.answer(question).await?;
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: answer.answer.clone(),
        });
        Ok(answer.answer)
    }
}
