
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::ingest::chunking::ChunkingConfig;
use crate::retriever::RetrieverConfig;

pub const DEFAULT_OLLAMA_EMBEDDING_DIMENSION: u32 = 768;
pub const DEFAULT_AZURE_EMBEDDING_DIMENSION: u32 = 1536;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrieverConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which service answers embedding and chat requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Azure,
}

impl std::fmt::Display for ProviderKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Azure => write!(f, "azure"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub chat_model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            chat_model: "llama3.2:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_OLLAMA_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AzureConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub embedding_deployment: String,
    pub embedding_model: String,
    pub chat_deployment: String,
    pub chat_model: String,
    pub embedding_batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2023-05-15".to_string(),
            embedding_deployment: String::new(),
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_deployment: String::new(),
            chat_model: "gpt-35-turbo".to_string(),
            // One text per request keeps within the strictest deployment limits
            embedding_batch_size: 1,
            embedding_dimension: DEFAULT_AZURE_EMBEDDING_DIMENSION,
        }
    }
}

/// Caller-side policy for outbound provider requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequestConfig {
    /// Overall per-request timeout; no timeout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Total attempts per request, including the first
    pub retry_attempts: u32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            retry_attempts: 1,
        }
    }
}

impl RequestConfig {
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Missing Azure OpenAI setting: {0}")]
    MissingAzureSetting(&'static str),
    #[error("Invalid target chunk size: {0} (must be between 100 and 2048)")]
    InvalidTargetChunkSize(usize),
    #[error("Invalid max chunk size: {0} (must be between 200 and 4096)")]
    InvalidMaxChunkSize(usize),
    #[error("Invalid min chunk size: {0} (must be between 50 and 1024)")]
    InvalidMinChunkSize(usize),
    #[error("Invalid overlap size: {0} (must be between 0 and 512)")]
    InvalidOverlapSize(usize),
    #[error("Max chunk size ({0}) must be greater than target chunk size ({1})")]
    MaxChunkSizeTooSmall(usize, usize),
    #[error("Target chunk size ({0}) must be greater than min chunk size ({1})")]
    TargetChunkSizeTooSmall(usize, usize),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid score threshold: {0} (must be a finite number)")]
    InvalidScoreThreshold(f32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid request timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Environment variables honoured for Azure OpenAI, matching the `.env`
/// layout used by existing deployments of the chatbot.
pub const AZURE_ENV_OVERRIDES: [&str; 7] = [
    "OPENAI_API_KEY",
    "OPENAI_DEPLOYMENT_ENDPOINT",
    "OPENAI_DEPLOYMENT_NAME",
    "OPENAI_MODEL_NAME",
    "OPENAI_EMBEDDING_DEPLOYMENT_NAME",
    "OPENAI_EMBEDDING_MODEL_NAME",
    "OPENAI_DEPLOYMENT_VERSION",
];

impl Config {
    /// Default base directory, `~/.docqa`
    #[inline]
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".docqa"))
            .or_else(|| dirs::data_dir().map(|data| data.join("docqa")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when it
    /// does not exist. Azure settings from the environment take precedence.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides(|key| std::env::var(key).ok());

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Overlay Azure settings from `lookup`, skipping unset or blank values
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in AZURE_ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let target = match key {
                "OPENAI_API_KEY" => &mut self.azure.api_key,
                "OPENAI_DEPLOYMENT_ENDPOINT" => &mut self.azure.endpoint,
                "OPENAI_DEPLOYMENT_NAME" => &mut self.azure.chat_deployment,
                "OPENAI_MODEL_NAME" => &mut self.azure.chat_model,
                "OPENAI_EMBEDDING_DEPLOYMENT_NAME" => &mut self.azure.embedding_deployment,
                "OPENAI_EMBEDDING_MODEL_NAME" => &mut self.azure.embedding_model,
                _ => &mut self.azure.api_version,
            };
            *target = value;
        }
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            ProviderKind::Ollama => self.ollama.validate()?,
            ProviderKind::Azure => self.azure.validate()?,
        }
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;
        self.validate_request_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        // Validate individual bounds
        if !(100..=2048).contains(&config.target_chunk_size) {
            return Err(ConfigError::InvalidTargetChunkSize(
                config.target_chunk_size,
            ));
        }

        if !(200..=4096).contains(&config.max_chunk_size) {
            return Err(ConfigError::InvalidMaxChunkSize(config.max_chunk_size));
        }

        if !(50..=1024).contains(&config.min_chunk_size) {
            return Err(ConfigError::InvalidMinChunkSize(config.min_chunk_size));
        }

        if config.overlap_size > 512 {
            return Err(ConfigError::InvalidOverlapSize(config.overlap_size));
        }

        // Validate relationships between sizes
        if config.max_chunk_size <= config.target_chunk_size {
            return Err(ConfigError::MaxChunkSizeTooSmall(
                config.max_chunk_size,
                config.target_chunk_size,
            ));
        }

        if config.target_chunk_size <= config.min_chunk_size {
            return Err(ConfigError::TargetChunkSizeTooSmall(
                config.target_chunk_size,
                config.min_chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.retrieval.k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.k));
        }

        if let Some(threshold) = self.retrieval.score_threshold {
            if !threshold.is_finite() {
                return Err(ConfigError::InvalidScoreThreshold(threshold));
            }
        }

        Ok(())
    }

    fn validate_request_config(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.request.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(
                self.request.retry_attempts,
            ));
        }

        if let Some(timeout) = self.request.timeout_secs {
            if !(1..=3600).contains(&timeout) {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        Ok(())
    }

    /// Embedding dimension of the active provider
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        match self.provider {
            ProviderKind::Ollama => self.ollama.embedding_dimension as usize,
            ProviderKind::Azure => self.azure.embedding_dimension as usize,
        }
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the conversation history database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("conversation_history.db")
    }

    /// Get the path of the persisted vector index
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.get_base_dir().join("index.bin")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl AzureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingAzureSetting("endpoint"));
        }

        let endpoint = self.endpoint_url()?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(endpoint.scheme().to_string()));
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingAzureSetting("api_key"));
        }

        if self.api_version.trim().is_empty() {
            return Err(ConfigError::MissingAzureSetting("api_version"));
        }

        if self.embedding_deployment.trim().is_empty() {
            return Err(ConfigError::MissingAzureSetting("embedding_deployment"));
        }

        if self.chat_deployment.trim().is_empty() {
            return Err(ConfigError::MissingAzureSetting("chat_deployment"));
        }

        if self.embedding_batch_size == 0 || self.embedding_batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding_batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    /// The resource endpoint, normalized to end with a slash so relative
    /// deployment paths join beneath it
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.endpoint.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        Url::parse(&normalized).map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))
    }
}
