use crate::adapters::database::DbPool;
use crate::adapters::database::chat_message_repo::ChatMessageRepository;
use crate::adapters::database::chat_thread_repo::ChatThreadRepository;
use crate::domain::chat::ChatThread;
use crate::error::Result;
use async_trait::async_trait;

/// The slice of chat persistence the purge job needs.
#[async_trait]
pub trait ChatRecords: Send + Sync + std::fmt::Debug + 'static {
    async fn find_thread(&self, thread_id: i64) -> Result<Option<ChatThread>>;
    async fn media_paths(&self, thread_id: i64) -> Result<Vec<String>>;
    /// Returns the number of rows touched.
    async fn redact_messages(&self, thread_id: i64) -> Result<u64>;
}

#[derive(Clone, Debug)]
pub struct PgChatRecords {
    pool: DbPool,
    threads: ChatThreadRepository,
    messages: ChatMessageRepository,
}

impl PgChatRecords {
    #[must_use]
    pub const fn new(pool: DbPool, threads: ChatThreadRepository, messages: ChatMessageRepository) -> Self {
        Self { pool, threads, messages }
    }
}

#[async_trait]
impl ChatRecords for PgChatRecords {
    async fn find_thread(&self, thread_id: i64) -> Result<Option<ChatThread>> {
        let mut conn = self.pool.acquire().await?;
        self.threads.find_by_id(&mut conn, thread_id).await
    }

    async fn media_paths(&self, thread_id: i64) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        self.messages.media_paths(&mut conn, thread_id).await
    }

    async fn redact_messages(&self, thread_id: i64) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        self.messages.redact_thread(&mut conn, thread_id).await
    }
}
