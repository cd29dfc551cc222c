use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Default OpenAI API root shared by the embedding and completion clients.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
/// Default Ollama runtime address.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
/// Default directory that holds the single persisted index slot.
pub const DEFAULT_INDEX_PATH: &str = "index_store";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the SmartDoc assistant.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key used for both OpenAI endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Expected dimensionality of the produced vectors, when known.
    pub embedding_dimension: Option<usize>,
    /// Completion provider that writes the answers.
    pub completion_provider: CompletionProvider,
    /// Completion model identifier passed to the provider.
    pub completion_model: String,
    /// Sampling temperature for every completion request.
    pub completion_temperature: f32,
    /// Upper bound on generated tokens per answer.
    pub completion_max_tokens: u32,
    /// Maximum characters per chunk.
    pub text_splitter_chunk_size: usize,
    /// Number of chunks retrieved for each question.
    pub retrieval_top_k: usize,
    /// Directory holding the persisted index.
    pub index_path: PathBuf,
    /// Executable used to convert legacy word-processor files into text.
    pub doc_converter: String,
    /// Timeout applied to embedding and completion HTTP calls.
    pub http_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Offline deterministic feature hashing.
    Hash,
}

/// Supported completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionProvider {
    /// Hosted OpenAI completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_provider: EmbeddingProvider::OpenAI,
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimension: None,
            completion_provider: CompletionProvider::OpenAI,
            completion_model: "gpt-3.5-turbo-instruct".to_string(),
            completion_temperature: 0.7,
            completion_max_tokens: 500,
            text_splitter_chunk_size: 1000,
            retrieval_top_k: 4,
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            doc_converter: "antiword".to_string(),
            http_timeout_secs: 60,
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            ollama_url: load_env_optional("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(defaults.embedding_provider),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?,
            completion_provider: load_env_optional("COMPLETION_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("COMPLETION_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(defaults.completion_provider),
            completion_model: load_env_optional("COMPLETION_MODEL")
                .unwrap_or(defaults.completion_model),
            completion_temperature: parse_optional("COMPLETION_TEMPERATURE")?
                .unwrap_or(defaults.completion_temperature),
            completion_max_tokens: parse_optional("COMPLETION_MAX_TOKENS")?
                .unwrap_or(defaults.completion_max_tokens),
            text_splitter_chunk_size: parse_optional("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(defaults.text_splitter_chunk_size),
            retrieval_top_k: parse_optional("RETRIEVAL_TOP_K")?
                .unwrap_or(defaults.retrieval_top_k),
            index_path: load_env_optional("INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            doc_converter: load_env_optional("DOC_CONVERTER").unwrap_or(defaults.doc_converter),
            http_timeout_secs: parse_optional("HTTP_TIMEOUT_SECS")?
                .unwrap_or(defaults.http_timeout_secs),
            server_port: parse_optional("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that can never produce a working pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".to_string()));
        }
        if self.embedding_dimension == Some(0) {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        if !(0.0..=2.0).contains(&self.completion_temperature) {
            return Err(ConfigError::InvalidValue(
                "COMPLETION_TEMPERATURE".to_string(),
            ));
        }
        let needs_openai = self.embedding_provider == EmbeddingProvider::OpenAI
            || self.completion_provider == CompletionProvider::OpenAI;
        if needs_openai && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for CompletionProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        completion_provider = ?config.completion_provider,
        completion_model = %config.completion_model,
        index_path = %config.index_path.display(),
        chunk_size = config.text_splitter_chunk_size,
        top_k = config.retrieval_top_k,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
