// Retriever module
// Fixed search policy on top of the vector index


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::{DistanceMetric, RetrievalResult, VectorIndex};
use crate::providers::Embedder;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Maximum number of chunks returned per query
    pub k: usize,
    pub metric: DistanceMetric,
    /// Minimum similarity a chunk needs to be returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

impl Default for RetrieverConfig {
    #[inline]
    fn default() -> Self {
        Self {
            k: DEFAULT_TOP_K,
            metric: DistanceMetric::Cosine,
            score_threshold: None,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    config: RetrieverConfig,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Embed `query` and return at most `k` chunks at or above the threshold
    #[inline]
    pub fn retrieve(&self, query: &str) -> crate::Result<RetrievalResult> {
        let query_vector = self.embedder.embed(query)?;

        let mut results =
            self.index
                .search_with_metric(&query_vector, self.config.k, self.config.metric)?;

        if let Some(threshold) = self.config.score_threshold {
            let before = results.len();
            results.retain(|hit| hit.similarity >= threshold);
            debug!(
                "Score threshold {} kept {} of {} results",
                threshold,
                results.len(),
                before
            );
        }

        debug!(
            "Retrieved {} chunks from {} documents",
            results.len(),
            results
                .iter()
                .map(|hit| hit.chunk.document_name())
                .collect::<std::collections::BTreeSet<_>>()
                .len()
        );
        Ok(results)
    }
}
