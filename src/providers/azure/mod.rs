
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::http::HttpTransport;
use super::{ChatMessage, ChatModel, Embedder, Embedding, EmbeddingError, SynthesisError};
use crate::config::Config;

/// Client for an Azure OpenAI resource with one embedding deployment and
/// one chat deployment
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    embeddings_url: Url,
    chat_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    batch_size: u32,
    dimension: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl AzureOpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let azure = &config.azure;
        let endpoint = azure
            .endpoint_url()
            .context("Failed to parse Azure OpenAI endpoint")?;

        let deployment_url = |deployment: &str, operation: &str| -> Result<Url> {
            let mut url = endpoint
                .join(&format!("openai/deployments/{}/{}", deployment, operation))
                .with_context(|| format!("Failed to build URL for deployment {}", deployment))?;
            url.query_pairs_mut()
                .append_pair("api-version", &azure.api_version);
            Ok(url)
        };

        Ok(Self {
            embeddings_url: deployment_url(&azure.embedding_deployment, "embeddings")?,
            chat_url: deployment_url(&azure.chat_deployment, "chat/completions")?,
            api_key: azure.api_key.clone(),
            embedding_model: azure.embedding_model.clone(),
            chat_model: azure.chat_model.clone(),
            batch_size: azure.embedding_batch_size,
            dimension: azure.embedding_dimension as usize,
            transport: HttpTransport::new(
                config.request.timeout(),
                config.request.retry_attempts,
            ),
        })
    }

    fn headers(&self) -> [(&str, &str); 1] {
        [("api-key", self.api_key.as_str())]
    }
}

impl Embedder for AzureOpenAiClient {
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

        let request_json = serde_json::to_string(&EmbeddingsRequest { input: texts })
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        debug!(
            "Requesting {} embeddings from deployment at {}",
            texts.len(),
            self.embeddings_url.path()
        );
        let response_text =
            self.transport
                .post_json(&self.embeddings_url, &self.headers(), &request_json)?;

        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        // Results are keyed by input index and are not guaranteed to arrive in order
        response.data.sort_by_key(|item| item.index);
        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

impl ChatModel for AzureOpenAiClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, SynthesisError> {
        let request_json = serde_json::to_string(&ChatCompletionRequest { messages })
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        debug!(
            "Requesting chat completion from deployment at {}",
            self.chat_url.path()
        );
        let response_text = self
            .transport
            .post_json(&self.chat_url, &self.headers(), &request_json)?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                SynthesisError::MalformedResponse("response contained no choices".to_string())
            })
    }
}
