use crate::adapters::database::records::ChatMessageRecord;
use crate::domain::chat::{ChatMessage, MessageDraft};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

#[derive(Clone, Copy, Debug, Default)]
pub struct ChatMessageRepository {}

impl ChatMessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Stores a message in a thread.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the thread does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, draft))]
    pub(crate) async fn create(
        &self,
        conn: &mut PgConnection,
        thread_id: i64,
        sender_id: i64,
        draft: MessageDraft,
    ) -> Result<ChatMessage> {
        let result = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            INSERT INTO chat_messages (thread_id, sender_id, text, media_path, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, thread_id, sender_id, text, media_path, latitude, longitude, created_at, updated_at
            "#,
        )
        .bind(thread_id)
        .bind(sender_id)
        .bind(draft.text)
        .bind(draft.media_path)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: thread was deleted underneath us
                Err(AppError::NotFound)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Fetches a page of a thread's messages, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_page(
        &self,
        conn: &mut PgConnection,
        thread_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            SELECT id, thread_id, sender_id, text, media_path, latitude, longitude, created_at, updated_at
            FROM chat_messages
            WHERE thread_id = $1
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(thread_id)
        .bind(before)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Returns the distinct media keys referenced by a thread's messages.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn media_paths(&self, conn: &mut PgConnection, thread_id: i64) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT media_path FROM chat_messages WHERE thread_id = $1 AND media_path IS NOT NULL",
        )
        .bind(thread_id)
        .fetch_all(conn)
        .await?;
        Ok(paths)
    }

    /// Nulls text, media and location on every message of a thread in one statement.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn redact_thread(&self, conn: &mut PgConnection, thread_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET text = NULL, media_path = NULL, latitude = NULL, longitude = NULL, updated_at = NOW()
            WHERE thread_id = $1
            "#,
        )
        .bind(thread_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
