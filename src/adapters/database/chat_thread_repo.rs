use crate::adapters::database::records::ChatThreadRecord;
use crate::domain::chat::ChatThread;
use crate::error::{AppError, Result};
use sqlx::PgConnection;

const THREAD_COLUMNS: &str = "id, request_id, client_id, admin_id, status, opened_at, closed_at";

#[derive(Clone, Copy, Debug, Default)]
pub struct ChatThreadRepository {}

impl ChatThreadRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Opens a new thread for a service request.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the request already has an open thread.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn create(&self, conn: &mut PgConnection, request_id: i64, client_id: i64) -> Result<ChatThread> {
        let result = sqlx::query_as::<_, ChatThreadRecord>(&format!(
            "INSERT INTO chat_threads (request_id, client_id) VALUES ($1, $2) RETURNING {THREAD_COLUMNS}"
        ))
        .bind(request_id)
        .bind(client_id)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => record.try_into(),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                // Unique violation on the one-open-thread-per-request index
                Err(AppError::Conflict("Request already has an open chat".into()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Finds a thread by its ID.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: i64) -> Result<Option<ChatThread>> {
        let record =
            sqlx::query_as::<_, ChatThreadRecord>(&format!("SELECT {THREAD_COLUMNS} FROM chat_threads WHERE id = $1"))
                .bind(id)
                .fetch_optional(conn)
                .await?;

        record.map(TryInto::try_into).transpose()
    }

    /// Finds the open thread of a service request, if any.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_open_for_request(
        &self,
        conn: &mut PgConnection,
        request_id: i64,
    ) -> Result<Option<ChatThread>> {
        let record = sqlx::query_as::<_, ChatThreadRecord>(&format!(
            "SELECT {THREAD_COLUMNS} FROM chat_threads WHERE request_id = $1 AND status = 'open'"
        ))
        .bind(request_id)
        .fetch_optional(conn)
        .await?;

        record.map(TryInto::try_into).transpose()
    }

    /// Assigns an admin to an open thread that has none yet.
    ///
    /// Returns `None` when the thread is closed or already has a different admin.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn assign_admin(
        &self,
        conn: &mut PgConnection,
        id: i64,
        admin_id: i64,
    ) -> Result<Option<ChatThread>> {
        let record = sqlx::query_as::<_, ChatThreadRecord>(&format!(
            r#"
            UPDATE chat_threads SET admin_id = $2
            WHERE id = $1 AND status = 'open' AND (admin_id IS NULL OR admin_id = $2)
            RETURNING {THREAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(admin_id)
        .fetch_optional(conn)
        .await?;

        record.map(TryInto::try_into).transpose()
    }

    /// Moves a thread from `open` to `closed`.
    ///
    /// Only the caller that performs the transition gets the thread back, so
    /// concurrent closers cannot both observe it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn close(&self, conn: &mut PgConnection, id: i64) -> Result<Option<ChatThread>> {
        let record = sqlx::query_as::<_, ChatThreadRecord>(&format!(
            r#"
            UPDATE chat_threads SET status = 'closed', closed_at = NOW()
            WHERE id = $1 AND status = 'open'
            RETURNING {THREAD_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        record.map(TryInto::try_into).transpose()
    }
}
