
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::http::HttpTransport;
use super::{ChatMessage, ChatModel, Embedder, Embedding, EmbeddingError, SynthesisError};
use crate::config::Config;

/// Client for a local Ollama server, serving both embeddings and chat
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    chat_model: String,
    batch_size: u32,
    dimension: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            embedding_model: config.ollama.embedding_model.clone(),
            chat_model: config.ollama.chat_model.clone(),
            batch_size: config.ollama.batch_size,
            dimension: config.ollama.embedding_dimension as usize,
            transport: HttpTransport::new(
                config.request.timeout(),
                config.request.retry_attempts,
            ),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_timeout(Some(timeout));
        self
    }

    /// Test connection to the Ollama server and verify both models are pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_models().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.embedding_model, self.chat_model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        self.transport
            .get(&url)
            .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured embedding and chat models are available
    #[inline]
    pub fn validate_models(&self) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;
        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        for model in [&self.embedding_model, &self.chat_model] {
            debug!("Validating model: {}", model);
            if !available.contains(&model.as_str()) {
                warn!(
                    "Model {} not found. Available models: {:?}",
                    model, available
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available
                ));
            }
        }

        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .transport
            .get(&url)
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url
            .join(path)
            .map_err(|e| format!("invalid Ollama URL: {}", e))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn max_batch_size(&self) -> usize {
        self.batch_size as usize
    }

    #[inline]
    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("/api/embed").map_err(EmbeddingError::Network)?;
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        debug!("Requesting {} embeddings from {}", texts.len(), url);
        let response_text = self.transport.post_json(&url, &[], &request_json)?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        Ok(response.embeddings)
    }
}

impl ChatModel for OllamaClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, SynthesisError> {
        let url = self.endpoint("/api/chat").map_err(SynthesisError::Network)?;
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            stream: false,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        debug!("Requesting chat completion from {}", url);
        let response_text = self.transport.post_json(&url, &[], &request_json)?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        Ok(response.message.content)
    }
}
