use crate::domain::chat::{ChatMessage, ChatThread, ThreadStatus};
use crate::error::AppError;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct ChatThreadRecord {
    pub(crate) id: i64,
    pub(crate) request_id: i64,
    pub(crate) client_id: i64,
    pub(crate) admin_id: Option<i64>,
    pub(crate) status: String,
    pub(crate) opened_at: OffsetDateTime,
    pub(crate) closed_at: Option<OffsetDateTime>,
}

impl TryFrom<ChatThreadRecord> for ChatThread {
    type Error = AppError;

    fn try_from(record: ChatThreadRecord) -> Result<Self, Self::Error> {
        let status = record.status.parse::<ThreadStatus>().map_err(|e| {
            tracing::error!(error = %e, thread_id = record.id, "Corrupt thread status");
            AppError::Internal
        })?;

        Ok(Self {
            id: record.id,
            request_id: record.request_id,
            client_id: record.client_id,
            admin_id: record.admin_id,
            status,
            opened_at: record.opened_at,
            closed_at: record.closed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChatMessageRecord {
    pub(crate) id: i64,
    pub(crate) thread_id: i64,
    pub(crate) sender_id: i64,
    pub(crate) text: Option<String>,
    pub(crate) media_path: Option<String>,
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<ChatMessageRecord> for ChatMessage {
    fn from(record: ChatMessageRecord) -> Self {
        Self {
            id: record.id,
            thread_id: record.thread_id,
            sender_id: record.sender_id,
            text: record.text,
            media_path: record.media_path,
            latitude: record.latitude,
            longitude: record.longitude,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
