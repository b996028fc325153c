// Pipeline module
// Caller-facing ingest and ask operations composed from the other modules

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{ConversationRecord, ConversationStore, ConversationSummary};
use crate::index::{DistanceMetric, VectorIndex};
use crate::ingest::{ChunkingConfig, IngestionWarning, chunk_document, load_directory};
use crate::providers::{self, ChatModel, Embedder};
use crate::retriever::{Retriever, RetrieverConfig};
use crate::synthesis::AnswerSynthesizer;
use crate::{RagError, Result};

/// A built or loaded index, shared by every question asked against it
#[derive(Debug, Clone)]
pub struct CorpusHandle {
    index: Arc<VectorIndex>,
}

impl CorpusHandle {
    #[inline]
    pub fn new(index: VectorIndex) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    #[inline]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        self.index.save(path)?;
        Ok(())
    }

    /// Load a saved index built with `dimension`-sized embeddings
    #[inline]
    pub fn load(path: &Path, dimension: usize) -> Result<Self> {
        let index = VectorIndex::load_compatible(path, dimension)?;
        info!(
            "Loaded corpus of {} chunks from {} documents",
            index.len(),
            index.document_names().len()
        );
        Ok(Self::new(index))
    }
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub corpus: CorpusHandle,
    pub warnings: Vec<IngestionWarning>,
    /// Number of documents that produced text
    pub documents: usize,
    pub chunks: usize,
}

/// Loads, chunks and embeds a document directory into a fresh index
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    metric: DistanceMetric,
}

impl Ingestor {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig, metric: DistanceMetric) -> Self {
        Self {
            embedder,
            chunking,
            metric,
        }
    }

    /// Rebuild the corpus from every supported file in `directory`.
    ///
    /// Unreadable files become warnings; an embedding failure aborts the run.
    #[inline]
    pub fn ingest(&self, directory: &Path) -> Result<IngestOutcome> {
        let loaded = load_directory(directory)?;

        let chunks: Vec<_> = loaded
            .documents
            .iter()
            .flat_map(|document| chunk_document(document, &self.chunking))
            .collect();
        info!(
            "Split {} documents into {} chunks",
            loaded.documents.len(),
            chunks.len()
        );
        if chunks.is_empty() {
            warn!("No text found in {}; the index will be empty", directory.display());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embed_with_progress(&texts)?;

        let index = VectorIndex::build(self.metric, vectors.into_iter().zip(chunks).collect())?;
        let chunk_count = index.len();

        Ok(IngestOutcome {
            corpus: CorpusHandle::new(index),
            warnings: loaded.warnings,
            documents: loaded.documents.len(),
            chunks: chunk_count,
        })
    }

    fn embed_with_progress(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let bar = if console::user_attended_stderr() {
            ProgressBar::new(texts.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedder.max_batch_size().max(1)) {
            let embedded = self.embedder.embed_batch(batch);
            let embedded = match embedded {
                Ok(embedded) => embedded,
                Err(e) => {
                    bar.abandon();
                    return Err(e.into());
                }
            };
            vectors.extend(embedded);
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        debug!(
            "Embedded {} chunks with {}",
            vectors.len(),
            self.embedder.model_name()
        );
        Ok(vectors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskResponse {
    pub answer: String,
    /// Distinct documents the answer drew on, sorted
    pub source_document_names: Vec<String>,
    pub record_id: i64,
}

/// Answers questions against a corpus and keeps the conversation log
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    synthesizer: AnswerSynthesizer,
    store: ConversationStore,
    retrieval: RetrieverConfig,
}

impl RagPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
        store: ConversationStore,
        retrieval: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            synthesizer: AnswerSynthesizer::new(chat_model),
            store,
            retrieval,
        }
    }

    /// Connect to the configured provider and open the conversation log
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let (embedder, chat_model) = providers::from_config(config)?;
        let store = ConversationStore::initialize_from_config_dir(config.get_base_dir()).await?;
        Ok(Self::new(embedder, chat_model, store, config.retrieval))
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Answer `question` from `corpus` and log the exchange.
    ///
    /// Nothing is logged unless an answer was produced.
    #[inline]
    pub async fn ask(&self, question: &str, corpus: &CorpusHandle) -> Result<AskResponse> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }

        let retriever = Retriever::new(
            Arc::clone(&self.embedder),
            Arc::clone(corpus.index()),
            self.retrieval,
        );
        let retrieved = retriever.retrieve(question)?;
        let answer = self.synthesizer.answer(question, retrieved)?;
        let source_document_names = answer.source_document_names();

        let record_id = self
            .store
            .record(question, &answer.text, &source_document_names)
            .await?;
        info!(
            "Answered question as conversation {} citing {:?}",
            record_id, source_document_names
        );

        Ok(AskResponse {
            answer: answer.text,
            source_document_names,
            record_id,
        })
    }

    #[inline]
    pub async fn history(&self) -> Result<Vec<ConversationSummary>> {
        self.store.summaries().await
    }

    #[inline]
    pub async fn get_record(&self, id: i64) -> Result<ConversationRecord> {
        self.store.get(id).await
    }

    #[inline]
    pub async fn delete_record(&self, id: i64) -> Result<()> {
        self.store.delete(id).await
    }
}
