
use super::models::*;
use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub struct ConversationQueries;

impl ConversationQueries {
    /// Insert a conversation named after its position in the log.
    ///
    /// Counting and inserting share one transaction so the name and the row
    /// are written together.
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        new_conversation: &NewConversation,
        timestamp: &str,
    ) -> Result<i64> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin conversation transaction")?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count conversations")?;
        let name = format!("Conversation {}", count + 1);

        let id = sqlx::query(
            "INSERT INTO conversations (name, timestamp, question, answer, source_document_names) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(timestamp)
        .bind(&new_conversation.question)
        .bind(&new_conversation.answer)
        .bind(join_source_names(&new_conversation.source_document_names))
        .execute(&mut *tx)
        .await
        .context("Failed to insert conversation")?
        .last_insert_rowid();

        tx.commit()
            .await
            .context("Failed to commit conversation")?;

        debug!("Recorded {} with id {}", name, id);
        Ok(id)
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ConversationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, timestamp, question, answer, source_document_names
            FROM conversations WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get conversation by id")?;

        Ok(row.as_ref().map(record_from_row))
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ConversationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, timestamp, question, answer, source_document_names
            FROM conversations ORDER BY id ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list conversations")?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Delete a conversation; returns whether a row was removed
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete conversation")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(pool)
            .await
            .context("Failed to count conversations")?;

        Ok(count)
    }
}

fn record_from_row(row: &SqliteRow) -> ConversationRecord {
    let names: String = row.get("source_document_names");
    ConversationRecord {
        id: row.get("id"),
        name: row.get("name"),
        timestamp: row.get("timestamp"),
        question: row.get("question"),
        answer: row.get("answer"),
        source_document_names: split_source_names(&names),
    }
}
