// Deterministic stand-ins for the embedding and chat providers

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::providers::{
    ChatMessage, ChatModel, Embedder, Embedding, EmbeddingError, SynthesisError,
};

/// Embeds text as keyword occurrence counts over a fixed vocabulary
pub(crate) struct KeywordEmbedder {
    vocabulary: Vec<String>,
    requests: AtomicUsize,
    failure: Option<EmbeddingError>,
}

impl KeywordEmbedder {
    pub(crate) fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(ToString::to_string).collect(),
            requests: AtomicUsize::new(0),
            failure: None,
        }
    }

    pub(crate) fn failing(vocabulary: &[&str], failure: EmbeddingError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(vocabulary)
        }
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn vector_for(&self, text: &str) -> Embedding {
        let lower = text.to_lowercase();
        self.vocabulary
            .iter()
            .map(|word| lower.matches(word.as_str()).count() as f32)
            .collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn max_batch_size(&self) -> usize {
        8
    }

    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Replies with a fixed answer and remembers every conversation it was sent
pub(crate) struct ScriptedChatModel {
    reply: Result<String, SynthesisError>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(failure: SynthesisError) -> Self {
        Self {
            reply: Err(failure),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

impl ChatModel for ScriptedChatModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String, SynthesisError> {
        self.calls
            .lock()
            .expect("lock should not be poisoned")
            .push(messages.to_vec());
        self.reply.clone()
    }
}
