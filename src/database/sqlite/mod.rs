use anyhow::Context;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::RagError;
use crate::database::sqlite::models::TIMESTAMP_FORMAT;
use crate::database::sqlite::queries::ConversationQueries;

pub use models::{ConversationRecord, ConversationSummary, NewConversation};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// File name of the conversation log inside the base directory
pub const DATABASE_FILE_NAME: &str = "conversation_history.db";

fn database_error(error: anyhow::Error) -> RagError {
    RagError::Database(format!("{:#}", error))
}

/// Durable log of answered questions
#[derive(Debug, Clone)]
pub struct ConversationStore {
    pool: DbPool,
}

impl ConversationStore {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> crate::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")
            .map_err(database_error)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> crate::Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(database_error)?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open `conversation_history.db` inside `config_dir`, creating both if needed
    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> crate::Result<Self> {
        std::fs::create_dir_all(config_dir)?;
        Self::new(config_dir.join(DATABASE_FILE_NAME)).await
    }

    /// Append a conversation stamped with the current UTC time
    #[inline]
    pub async fn record(
        &self,
        question: &str,
        answer: &str,
        source_document_names: &[String],
    ) -> crate::Result<i64> {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let new_conversation = NewConversation {
            question: question.to_string(),
            answer: answer.to_string(),
            source_document_names: source_document_names.to_vec(),
        };

        ConversationQueries::create(&self.pool, &new_conversation, &timestamp)
            .await
            .map_err(database_error)
    }

    /// All conversations, oldest first
    #[inline]
    pub async fn list(&self) -> crate::Result<Vec<ConversationRecord>> {
        ConversationQueries::list_all(&self.pool)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn summaries(&self) -> crate::Result<Vec<ConversationSummary>> {
        Ok(self
            .list()
            .await?
            .iter()
            .map(ConversationRecord::summary)
            .collect())
    }

    #[inline]
    pub async fn get(&self, id: i64) -> crate::Result<ConversationRecord> {
        ConversationQueries::get_by_id(&self.pool, id)
            .await
            .map_err(database_error)?
            .ok_or(RagError::NotFound(id))
    }

    /// Remove a conversation. Deleting an absent id is not an error.
    #[inline]
    pub async fn delete(&self, id: i64) -> crate::Result<()> {
        let removed = ConversationQueries::delete(&self.pool, id)
            .await
            .map_err(database_error)?;
        if removed {
            info!("Deleted conversation {}", id);
        } else {
            debug!("Conversation {} was already absent", id);
        }
        Ok(())
    }

    #[inline]
    pub async fn count(&self) -> crate::Result<i64> {
        ConversationQueries::count(&self.pool)
            .await
            .map_err(database_error)
    }
}
