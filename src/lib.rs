use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conversation {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Embedding(#[from] providers::EmbeddingError),

    #[error(transparent)]
    Synthesis(#[from] providers::SynthesisError),

    #[error(transparent)]
    Index(#[from] index::IndexError),

    #[error(transparent)]
    IndexLoad(#[from] index::IndexLoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RagError {
    #[inline]
    fn from(error: sqlx::Error) -> Self {
        Self::Database(error.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod providers;
pub mod retriever;
pub mod synthesis;

#[cfg(test)]
mod test_support;
