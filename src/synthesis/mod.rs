// Answer synthesis module
// Conditions a chat model on retrieved chunks to answer a question


use std::sync::Arc;

use tracing::debug;

use crate::index::{RetrievalResult, ScoredChunk};
use crate::providers::{ChatMessage, ChatModel, SynthesisError};

const ANSWER_INSTRUCTIONS: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CONTEXT_DIVIDER: &str = "----------------";

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The model's reply, unmodified
    pub text: String,
    /// The chunks the answer was conditioned on, in retrieval order
    pub used_chunks: Vec<ScoredChunk>,
}

impl Answer {
    /// Distinct document names of the used chunks, sorted
    #[inline]
    pub fn source_document_names(&self) -> Vec<String> {
        use itertools::Itertools;

        self.used_chunks
            .iter()
            .map(|hit| hit.chunk.document_name().to_string())
            .sorted()
            .dedup()
            .collect()
    }
}

pub struct AnswerSynthesizer {
    chat_model: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(chat_model: Arc<dyn ChatModel>) -> Self {
        Self { chat_model }
    }

    /// Place every retrieved chunk into one prompt and ask the model
    #[inline]
    pub fn answer(
        &self,
        question: &str,
        retrieved: RetrievalResult,
    ) -> Result<Answer, SynthesisError> {
        let messages = build_messages(question, &retrieved);

        debug!(
            "Asking {} with {} context chunks",
            self.chat_model.model_name(),
            retrieved.len()
        );
        let text = self.chat_model.complete(&messages)?;

        Ok(Answer {
            text,
            used_chunks: retrieved,
        })
    }
}

/// System message with instructions and context, then the question
#[inline]
pub fn build_messages(question: &str, retrieved: &[ScoredChunk]) -> Vec<ChatMessage> {
    let context = retrieved
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(format!(
            "{}\n{}\n{}",
            ANSWER_INSTRUCTIONS, CONTEXT_DIVIDER, context
        )),
        ChatMessage::user(question),
    ]
}
