// Providers module
// External embedding and chat-completion services (Ollama, Azure OpenAI)

pub mod azure;
mod http;
pub mod ollama;


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, ProviderKind};

pub use azure::AzureOpenAiClient;
pub use http::RequestFailure;
pub use ollama::OllamaClient;

/// A fixed-dimension vector representation of a text span
pub type Embedding = Vec<f32>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Embedding provider unreachable: {0}")]
    Network(String),

    #[error("Embedding provider rejected the credentials (HTTP {0})")]
    Auth(u16),

    #[error("Embedding provider rate limit exceeded")]
    RateLimited,

    #[error("Embedding provider returned HTTP {0}")]
    Http(u16),

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Language model unreachable: {0}")]
    Network(String),

    #[error("Language model rejected the credentials (HTTP {0})")]
    Auth(u16),

    #[error("Language model rate limit exceeded")]
    RateLimited,

    #[error("Language model returned HTTP {0}")]
    Http(u16),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

impl From<RequestFailure> for EmbeddingError {
    #[inline]
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::Network(message) => Self::Network(message),
            RequestFailure::Status(status @ (401 | 403)) => Self::Auth(status),
            RequestFailure::Status(429) => Self::RateLimited,
            RequestFailure::Status(status) => Self::Http(status),
        }
    }
}

impl From<RequestFailure> for SynthesisError {
    #[inline]
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::Network(message) => Self::Network(message),
            RequestFailure::Status(status @ (401 | 403)) => Self::Auth(status),
            RequestFailure::Status(429) => Self::RateLimited,
            RequestFailure::Status(status) => Self::Http(status),
        }
    }
}

/// Converts text into vectors through an external embedding model
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Output dimension the model is configured for
    fn dimension(&self) -> usize;

    /// Maximum number of texts sent in one provider request
    fn max_batch_size(&self) -> usize;

    /// Issue a single provider request. `texts` never exceeds [`Self::max_batch_size`].
    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Embed one text
    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()])?;
        embeddings.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Embed many texts, split into sequential requests of at most
    /// [`Self::max_batch_size`] texts. Output order matches input order.
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.max_batch_size().max(1)) {
            let batch_embeddings = self.request_embeddings(batch)?;
            if batch_embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: batch_embeddings.len(),
                });
            }
            embeddings.extend(batch_embeddings);
        }

        let expected = self.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        debug!(
            "Embedded {} texts with {} in {} requests",
            texts.len(),
            self.model_name(),
            texts.len().div_ceil(self.max_batch_size().max(1))
        );
        Ok(embeddings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat-style language model
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the conversation and return the model's reply text unmodified
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, SynthesisError>;
}

/// Build the embedder and chat model for the configured provider
#[inline]
pub fn from_config(config: &Config) -> anyhow::Result<(Arc<dyn Embedder>, Arc<dyn ChatModel>)> {
    info!("Using {} provider", config.provider);
    match config.provider {
        ProviderKind::Ollama => {
            let client = Arc::new(OllamaClient::new(config)?);
            let embedder: Arc<dyn Embedder> = client.clone();
            let chat: Arc<dyn ChatModel> = client;
            Ok((embedder, chat))
        }
        ProviderKind::Azure => {
            let client = Arc::new(AzureOpenAiClient::new(config)?);
            let embedder: Arc<dyn Embedder> = client.clone();
            let chat: Arc<dyn ChatModel> = client;
            Ok((embedder, chat))
        }
    }
}
