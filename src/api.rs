//! HTTP surface for the SmartDoc assistant.
//!
//! The router wraps one shared [`ChatSession`] behind an async mutex, so each action runs to
//! completion before the next one starts:
//!
//! - `POST /documents` – Upload raw document bytes. The `Content-Type` header is the declared
//!   type; an optional `x-file-name` header is kept for display. Returns the extracted size.
//! - `POST /process` – Build the index from the current upload and return the stage events.
//! - `POST /chat` – Answer `{ "question": "..." }` from the index; returns `{ "answer": "..." }`.
//! - `GET /messages` – Chat log since the last upload or process action.
//! - `GET /status` – Session state, current upload, and whether an index exists.
//! - `GET /metrics` – Processing and answering counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::extraction::{Document, TextExtractor};
use crate::index::IndexError;
use crate::processing::{
    AnswerError, CollectingProgress, PipelineApi, ProcessingError, ProgressEvent,
    TracingProgress,
};
use crate::session::{
    ChatMessage, ChatSession, ProcessOutcome, SessionError, SessionState, UploadedDocument,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Header carrying the uploaded file's original name.
pub const FILE_NAME_HEADER: &str = "x-file-name";

struct AppState<S> {
    pipeline: Arc<S>,
    extractor: TextExtractor,
    session: Arc<Mutex<ChatSession>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            extractor: self.extractor.clone(),
            session: Arc::clone(&self.session),
        }
    }
}

/// Build the HTTP router around `pipeline` and a single shared session.
pub fn create_router<S>(pipeline: Arc<S>, session: ChatSession) -> Router
where
    S: PipelineApi + 'static,
{
    let state = AppState {
        pipeline,
        extractor: session.extractor().clone(),
        session: Arc::new(Mutex::new(session)),
    };
    Router::new()
        .route(
            "/documents",
            post(upload_document::<S>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/process", post(process_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/messages", get(list_messages::<S>))
        .route("/status", get(get_status::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(state)
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    file_name: Option<String>,
    content_type: String,
    /// Characters extracted; zero means processing will skip the rebuild.
    extracted_chars: usize,
    state: SessionState,
}

/// Store an uploaded document in the session and extract its text.
async fn upload_document<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<UploadResponse>
where
    S: PipelineApi,
{
    let content_type = header_value(&headers, CONTENT_TYPE.as_str())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let mut document = Document::new(body.to_vec(), content_type);
    if let Some(name) = header_value(&headers, FILE_NAME_HEADER) {
        document = document.with_file_name(name);
    }

    // PDF parsing and legacy conversion block; keep them off the runtime and outside the lock.
    let file_name = document.file_name.clone();
    let declared = document.content_type.clone();
    let extractor = state.extractor.clone();
    let extracted =
        tokio::task::spawn_blocking(move || UploadedDocument::extract(&extractor, document))
            .await
            .unwrap_or_else(|error| {
                tracing::error!(error = %error, "Extraction task failed; storing empty text");
                UploadedDocument {
                    file_name,
                    content_type: declared,
                    text: String::new(),
                }
            });

    let mut session = state.session.lock().await;
    let uploaded = session.accept(extracted);
    let response = UploadResponse {
        file_name: uploaded.file_name.clone(),
        content_type: uploaded.content_type.clone(),
        extracted_chars: uploaded.text.chars().count(),
        state: session.state(),
    };
    Json(response)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Success response for `POST /process`.
#[derive(Serialize)]
struct ProcessResponse {
    outcome: ProcessOutcome,
    progress: Vec<ProgressEvent>,
    state: SessionState,
}

/// Build the index from the current upload.
async fn process_document<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<ProcessResponse>, AppError>
where
    S: PipelineApi,
{
    let progress = (CollectingProgress::new(), TracingProgress);
    let mut session = state.session.lock().await;
    let outcome = session.process(state.pipeline.as_ref(), &progress).await?;
    tracing::info!(
        indexed = matches!(outcome, ProcessOutcome::Indexed(_)),
        "Process request completed"
    );
    Ok(Json(ProcessResponse {
        outcome,
        progress: progress.0.events(),
        state: session.state(),
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

/// Response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

/// Answer one question from the persisted index.
async fn chat<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: PipelineApi,
{
    let mut session = state.session.lock().await;
    let answer = session
        .ask(state.pipeline.as_ref(), &request.question)
        .await?;
    Ok(Json(ChatResponse { answer }))
}

/// Response body for `GET /messages`.
#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<ChatMessage>,
}

async fn list_messages<S>(State(state): State<AppState<S>>) -> Json<MessagesResponse>
where
    S: PipelineApi,
{
    let session = state.session.lock().await;
    Json(MessagesResponse {
        messages: session.messages().to_vec(),
    })
}

/// Response body for `GET /status`.
#[derive(Serialize)]
struct StatusResponse {
    state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentStatus>,
    index_available: bool,
}

#[derive(Serialize)]
struct DocumentStatus {
    file_name: Option<String>,
    content_type: String,
    extracted_chars: usize,
}

async fn get_status<S>(State(state): State<AppState<S>>) -> Json<StatusResponse>
where
    S: PipelineApi,
{
    let session = state.session.lock().await;
    Json(StatusResponse {
        state: session.state(),
        document: session.document().map(|document| DocumentStatus {
            file_name: document.file_name.clone(),
            content_type: document.content_type.clone(),
            extracted_chars: document.text.chars().count(),
        }),
        index_available: state.pipeline.index_available(),
    })
}

/// Return the processing and answering counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<serde_json::Value>
where
    S: PipelineApi,
{
    Json(json!(state.pipeline.metrics_snapshot()))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/documents",
                description: "Upload raw document bytes. Set Content-Type to application/pdf, application/msword, or text/plain and optionally x-file-name.",
                request_example: None,
            },
            CommandDescriptor {
                name: "process",
                method: "POST",
                path: "/process",
                description: "Chunk the uploaded document, embed the chunks, and replace the index. Returns the outcome and stage progress events.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Answer a question from the index. Response returns { \"answer\": string }.",
                request_example: Some(json!({ "question": "What is this document about?" })),
            },
            CommandDescriptor {
                name: "messages",
                method: "GET",
                path: "/messages",
                description: "Return the chat log for the current document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "status",
                method: "GET",
                path: "/status",
                description: "Return the session state, the current upload, and whether an index exists.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return processing and answering counters.",
                request_example: None,
            },
        ],
    })
}

struct AppError(SessionError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::NoUploadedDocument => StatusCode::BAD_REQUEST,
            SessionError::Answer(AnswerError::EmptyQuestion) => StatusCode::BAD_REQUEST,
            SessionError::Answer(error) if error.is_index_not_found() => StatusCode::NOT_FOUND,
            SessionError::Answer(AnswerError::Index(
                IndexError::ModelMismatch { .. } | IndexError::UnsupportedVersion(_),
            )) => StatusCode::CONFLICT,
            SessionError::Answer(AnswerError::Embedding(_) | AnswerError::Completion(_))
            | SessionError::Processing(
                ProcessingError::Embedding(_) | ProcessingError::EmbeddingCountMismatch { .. },
            ) => StatusCode::BAD_GATEWAY,
            SessionError::Answer(AnswerError::Index(_))
            | SessionError::Processing(ProcessingError::Index(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::info!(error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(inner: SessionError) -> Self {
        Self(inner)
    }
}
