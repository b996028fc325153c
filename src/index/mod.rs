// Vector index module
// Exact nearest-neighbour search over chunk embeddings, persisted as one file


use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ingest::Chunk;
use crate::providers::Embedding;

const INDEX_MAGIC: &[u8; 8] = b"DOCQAIDX";
const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 3] = [Self::Cosine, Self::Euclidean, Self::Dot];

    /// Distance between two equal-length vectors; smaller is closer
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::Dot => -dot(a, b),
        }
    }

    /// Similarity score for a distance under this metric; larger is closer
    #[inline]
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::Euclidean => 1.0 / (1.0 + distance),
            Self::Dot => -distance,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::Dot => write!(f, "dot"),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Insertion order, starting from 0
    pub id: u64,
    pub vector: Embedding,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
    pub similarity: f32,
}

/// Search hits ordered by ascending distance
pub type RetrievalResult = Vec<ScoredChunk>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to write index: {0}")]
    Write(String),
}

#[derive(Error, Debug)]
pub enum IndexLoadError {
    #[error("No index found at {0}")]
    Missing(PathBuf),

    #[error("Failed to read index: {0}")]
    Io(#[from] io::Error),

    #[error("{0} is not an index file")]
    BadMagic(PathBuf),

    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("Index file is corrupt: {0}")]
    Corrupt(String),

    #[error("Index holds {actual}-dimensional vectors, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index header declares {expected} entries but {actual} were stored")]
    EntryCount { expected: u64, actual: u64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    version: u32,
    dimension: u64,
    metric: DistanceMetric,
    count: u64,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// In-memory flat index; every search scans all entries
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    metric: DistanceMetric,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from scratch, assigning ids in input order
    #[inline]
    pub fn build(
        metric: DistanceMetric,
        items: Vec<(Embedding, Chunk)>,
    ) -> Result<Self, IndexError> {
        let dimension = items.first().map_or(0, |(vector, _)| vector.len());

        let mut entries = Vec::with_capacity(items.len());
        for (id, (vector, chunk)) in (0u64..).zip(items) {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            entries.push(IndexEntry { id, vector, chunk });
        }

        debug!(
            "Built {} index with {} entries of dimension {}",
            metric,
            entries.len(),
            dimension
        );
        Ok(Self {
            dimension,
            metric,
            entries,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension; 0 for an empty index
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Distinct source document names, sorted
    #[inline]
    pub fn document_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.chunk.document_name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Search with the metric the index was built with
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult, IndexError> {
        self.search_with_metric(query, k, self.metric)
    }

    /// Exact top-k search. Ties keep insertion order.
    #[inline]
    pub fn search_with_metric(
        &self,
        query: &[f32],
        k: usize,
        metric: DistanceMetric,
    ) -> Result<RetrievalResult, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, metric.distance(query, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                distance,
                similarity: metric.similarity(distance),
            })
            .collect())
    }

    /// Write the index to `path`, replacing any existing file atomically
    #[inline]
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IndexError::Write(e.to_string()))?;
        }

        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let result = self.write_to(&tmp_path).and_then(|()| {
            fs::rename(&tmp_path, path).map_err(|e| IndexError::Write(e.to_string()))
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        info!(
            "Saved index with {} entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        let file = File::create(path).map_err(|e| IndexError::Write(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        let header = IndexHeader {
            version: INDEX_FORMAT_VERSION,
            dimension: self.dimension as u64,
            metric: self.metric,
            count: self.entries.len() as u64,
        };

        writer
            .write_all(INDEX_MAGIC)
            .map_err(|e| IndexError::Write(e.to_string()))?;
        codec()
            .serialize_into(&mut writer, &header)
            .map_err(|e| IndexError::Write(e.to_string()))?;
        codec()
            .serialize_into(&mut writer, &self.entries)
            .map_err(|e| IndexError::Write(e.to_string()))?;

        let file = writer
            .into_inner()
            .map_err(|e| IndexError::Write(e.to_string()))?;
        file.sync_all()
            .map_err(|e| IndexError::Write(e.to_string()))?;
        Ok(())
    }

    /// Read an index written by [`VectorIndex::save`]
    #[inline]
    pub fn load(path: &Path) -> Result<Self, IndexLoadError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IndexLoadError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(IndexLoadError::Io(e)),
        };

        let payload = bytes
            .strip_prefix(INDEX_MAGIC.as_slice())
            .ok_or_else(|| IndexLoadError::BadMagic(path.to_path_buf()))?;
        let mut cursor = Cursor::new(payload);

        let header: IndexHeader = codec()
            .deserialize_from(&mut cursor)
            .map_err(|e| IndexLoadError::Corrupt(e.to_string()))?;
        if header.version != INDEX_FORMAT_VERSION {
            return Err(IndexLoadError::UnsupportedVersion(header.version));
        }

        let entries: Vec<IndexEntry> = codec()
            .with_limit(payload.len() as u64)
            .deserialize_from(&mut cursor)
            .map_err(|e| IndexLoadError::Corrupt(e.to_string()))?;

        if cursor.position() != payload.len() as u64 {
            return Err(IndexLoadError::Corrupt(
                "unexpected trailing data".to_string(),
            ));
        }
        if entries.len() as u64 != header.count {
            return Err(IndexLoadError::EntryCount {
                expected: header.count,
                actual: entries.len() as u64,
            });
        }

        let dimension = header.dimension as usize;
        if let Some(entry) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(IndexLoadError::DimensionMismatch {
                expected: dimension,
                actual: entry.vector.len(),
            });
        }

        debug!(
            "Loaded index with {} entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            dimension,
            metric: header.metric,
            entries,
        })
    }

    /// Load an index and check it was built for `expected_dimension` vectors
    #[inline]
    pub fn load_compatible(path: &Path, expected_dimension: usize) -> Result<Self, IndexLoadError> {
        let index = Self::load(path)?;
        if !index.is_empty() && index.dimension != expected_dimension {
            return Err(IndexLoadError::DimensionMismatch {
                expected: expected_dimension,
                actual: index.dimension,
            });
        }
        Ok(index)
    }
}
