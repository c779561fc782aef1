use crate::adapters::database::chat_records::ChatRecords;
use crate::adapters::storage::ObjectStorage;
use crate::config::ChatFlags;
use crate::domain::chat::media_prefix;
use crate::error::{AppError, Result};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The thread no longer exists; nothing was touched.
    ThreadMissing,
    Purged { thread_id: i64, request_id: i64, redacted: bool, media_count: usize, objects_deleted: u64 },
}

/// Removes a closed thread's stored media and, when configured, redacts its messages.
///
/// Every step is idempotent, so a retried run converges to the same state.
#[derive(Debug, Clone)]
pub struct ChatPurgeHandler {
    records: Arc<dyn ChatRecords>,
    storage: Arc<dyn ObjectStorage>,
    flags: watch::Receiver<ChatFlags>,
    media_root: String,
}

impl ChatPurgeHandler {
    #[must_use]
    pub const fn new(
        records: Arc<dyn ChatRecords>,
        storage: Arc<dyn ObjectStorage>,
        flags: watch::Receiver<ChatFlags>,
        media_root: String,
    ) -> Self {
        Self { records, storage, flags, media_root }
    }

    /// Runs the purge for one thread.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` while the thread is still open, and propagates
    /// storage and database failures, so the caller can retry.
    #[tracing::instrument(err, skip(self), fields(thread_id = %thread_id))]
    pub async fn handle(&self, thread_id: i64) -> Result<PurgeOutcome> {
        let Some(thread) = self.records.find_thread(thread_id).await? else {
            tracing::debug!("Thread no longer exists, nothing to purge");
            return Ok(PurgeOutcome::ThreadMissing);
        };

        // The closing transaction may not have committed yet; fail so the retry policy waits for it
        if thread.is_open() {
            tracing::warn!(request_id = thread.request_id, "Thread is still open, purge deferred");
            return Err(AppError::Conflict(format!("Chat thread {} is still open", thread.id)));
        }

        let media_count = self.records.media_paths(thread.id).await?.len();

        let prefix = media_prefix(&self.media_root, thread.id);
        let objects_deleted = self.storage.delete_prefix(&prefix).await?;

        // Read at run time so operators can flip it without restarting workers
        let redact = self.flags.borrow().redact_messages;
        if redact {
            let rows = self.records.redact_messages(thread.id).await?;
            tracing::debug!(rows, "Messages redacted");
        }

        tracing::info!(
            chat = true,
            "threadId" = thread.id,
            "requestId" = thread.request_id,
            redacted = redact,
            media_count,
            objects_deleted,
            "Chat closed and media purged"
        );

        Ok(PurgeOutcome::Purged {
            thread_id: thread.id,
            request_id: thread.request_id,
            redacted: redact,
            media_count,
            objects_deleted,
        })
    }
}
