//! Text completion providers that write answers from retrieved context.
//!
//! The OpenAI client targets the legacy `/v1/completions` endpoint used by instruct models;
//! the Ollama client mirrors it through `/api/generate` with streaming disabled.

use crate::config::{CompletionProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Provider could not be constructed or reached.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text continuing `request.prompt`.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError>;
}

/// Assemble the question-answering prompt from retrieved chunk texts.
pub fn build_qa_prompt(context: &[&str], question: &str) -> String {
    let context = context.join("\n\n");
    format!(
        "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:"
    )
}

/// Build a completion client for the configured provider.
pub fn get_completion_client(
    config: &Config,
) -> Result<Box<dyn CompletionClient + Send + Sync>, CompletionClientError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    match config.completion_provider {
        CompletionProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                CompletionClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Box::new(OpenAiCompletionClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.completion_model.clone(),
                timeout,
            )?))
        }
        CompletionProvider::Ollama => Ok(Box::new(OllamaCompletionClient::new(
            config.ollama_url.clone(),
            config.completion_model.clone(),
            timeout,
        )?)),
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, CompletionClientError> {
    Client::builder()
        .user_agent("smartdoc/completion")
        .timeout(timeout)
        .build()
        .map_err(|error| {
            CompletionClientError::ProviderUnavailable(format!(
                "failed to build HTTP client: {error}"
            ))
        })
}

/// Completions from an OpenAI-compatible `/v1/completions` endpoint.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// Create a client for `base_url` authenticating with `api_key`.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, CompletionClientError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    text: String,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionClientError::ProviderUnavailable(format!(
                    "failed to reach OpenAI at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: OpenAiCompletionResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .ok_or_else(|| CompletionClientError::InvalidResponse("no choices returned".into()))
    }
}

/// Completions from a local Ollama runtime via `/api/generate`.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaCompletionClient {
    /// Create a client for the Ollama runtime at `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, CompletionClientError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CompletionClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(CompletionClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    #[test]
    fn prompt_places_context_before_question() {
        let prompt = build_qa_prompt(&["first chunk", "second chunk"], "What is it?");
        assert!(prompt.starts_with("Use the following pieces of context"));
        assert!(prompt.contains("first chunk\n\nsecond chunk"));
        assert!(prompt.ends_with("Question: What is it?\nHelpful Answer:"));
        let context_at = prompt.find("first chunk").expect("context");
        let question_at = prompt.find("Question:").expect("question");
        assert!(context_at < question_at);
    }

    #[tokio::test]
    async fn openai_client_sends_model_and_token_budget() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        r#"{"model": "gpt-3.5-turbo-instruct", "max_tokens": 500}"#,
                    );
                then.status(200).json_body(json!({
                    "choices": [{"text": "  Invoices are due in 30 days.\n"}]
                }));
            })
            .await;

        let client = OpenAiCompletionClient::new(
            server.base_url(),
            "sk-test".into(),
            "gpt-3.5-turbo-instruct".into(),
            Duration::from_secs(5),
        )
        .expect("client");
        let answer = client.complete(request("prompt")).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "Invoices are due in 30 days.");
    }

    #[tokio::test]
    async fn openai_client_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let client = OpenAiCompletionClient::new(
            server.base_url(),
            "sk-test".into(),
            "m".into(),
            Duration::from_secs(5),
        )
        .expect("client");
        let error = client.complete(request("p")).await.expect_err("empty");
        assert!(matches!(error, CompletionClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "Answer text",
                    "done": true
                }));
            })
            .await;

        let client =
            OllamaCompletionClient::new(server.base_url(), "llama3".into(), Duration::from_secs(5))
                .expect("client");
        let answer = client.complete(request("prompt")).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "Answer text");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let client =
            OllamaCompletionClient::new(server.base_url(), "llama3".into(), Duration::from_secs(5))
                .expect("client");
        let error = client.complete(request("prompt")).await.expect_err("error");

        assert!(
            matches!(error, CompletionClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[test]
    fn factory_requires_key_for_openai() {
        assert!(matches!(
            get_completion_client(&Config::default()),
            Err(CompletionClientError::ProviderUnavailable(_))
        ));
        let config = Config {
            completion_provider: CompletionProvider::Ollama,
            ..Config::default()
        };
        assert!(get_completion_client(&config).is_ok());
    }
}
