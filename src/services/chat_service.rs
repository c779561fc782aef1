use crate::adapters::database::DbPool;
use crate::adapters::database::chat_message_repo::ChatMessageRepository;
use crate::adapters::database::chat_thread_repo::ChatThreadRepository;
use crate::adapters::storage::ObjectStorage;
use crate::config::{ChatConfig, ChatFlags};
use crate::domain::chat::{ChatMessage, ChatThread, MessageDraft, media_prefix};
use crate::domain::job::JobPayload;
use crate::domain::policy::ChatThreadPolicy;
use crate::domain::user::Actor;
use crate::error::{AppError, Result};
use crate::services::job_dispatcher::JobDispatcher;
use bytes::Bytes;
use opentelemetry::{KeyValue, global, metrics::Counter};
use sqlx::PgConnection;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone, Debug)]
struct Metrics {
    messages_posted: Counter<u64>,
    threads_closed: Counter<u64>,
    denied: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("carechat-server");
        Self {
            messages_posted: meter
                .u64_counter("carechat_messages_posted_total")
                .with_description("Total chat messages stored")
                .build(),
            threads_closed: meter
                .u64_counter("carechat_threads_closed_total")
                .with_description("Total chat threads moved to closed")
                .build(),
            denied: meter
                .u64_counter("carechat_policy_denials_total")
                .with_description("Total chat operations refused by the thread policy")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatService {
    pool: DbPool,
    threads: ChatThreadRepository,
    messages: ChatMessageRepository,
    storage: Arc<dyn ObjectStorage>,
    dispatcher: JobDispatcher,
    flags: watch::Receiver<ChatFlags>,
    config: ChatConfig,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        threads: ChatThreadRepository,
        messages: ChatMessageRepository,
        storage: Arc<dyn ObjectStorage>,
        dispatcher: JobDispatcher,
        flags: watch::Receiver<ChatFlags>,
        config: ChatConfig,
    ) -> Self {
        Self { pool, threads, messages, storage, dispatcher, flags, config, metrics: Metrics::new() }
    }

    fn policy(&self) -> ChatThreadPolicy {
        ChatThreadPolicy::new(*self.flags.borrow())
    }

    fn deny(&self, action: &'static str) -> AppError {
        self.metrics.denied.add(1, &[KeyValue::new("action", action)]);
        AppError::Forbidden
    }

    async fn load(&self, conn: &mut PgConnection, thread_id: i64) -> Result<ChatThread> {
        self.threads.find_by_id(conn, thread_id).await?.ok_or(AppError::NotFound)
    }

    /// Opens a conversation for a service request, or returns the one already open.
    ///
    /// The flag is `true` when this call created the thread. The opener becomes the
    /// thread's client, so admins may only fetch an existing open thread.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if chat is disabled for the actor or an admin
    /// tries to start a new thread.
    #[tracing::instrument(err(level = "warn"), skip(self, actor), fields(user_id = actor.id))]
    pub async fn open_thread(&self, actor: Actor, request_id: i64) -> Result<(ChatThread, bool)> {
        if !self.policy().open(&actor) {
            return Err(self.deny("open"));
        }

        let mut conn = self.pool.acquire().await?;
        if let Some(existing) = self.threads.find_open_for_request(&mut conn, request_id).await? {
            return Ok((existing, false));
        }

        if actor.is_admin() {
            return Err(self.deny("open"));
        }

        match self.threads.create(&mut conn, request_id, actor.id).await {
            Ok(thread) => {
                tracing::info!(thread_id = thread.id, "Chat thread opened");
                Ok((thread, true))
            }
            // Lost a race with a concurrent opener
            Err(AppError::Conflict(_)) => self
                .threads
                .find_open_for_request(&mut conn, request_id)
                .await?
                .map(|thread| (thread, false))
                .ok_or(AppError::Internal),
            Err(e) => Err(e),
        }
    }

    /// # Errors
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    #[tracing::instrument(err(level = "warn"), skip(self, actor), fields(user_id = actor.id))]
    pub async fn get_thread(&self, actor: Actor, thread_id: i64) -> Result<ChatThread> {
        let mut conn = self.pool.acquire().await?;
        let thread = self.load(&mut conn, thread_id).await?;
        if !self.policy().view(&actor, &thread) {
            return Err(self.deny("view"));
        }
        Ok(thread)
    }

    /// Assigns the calling admin to the thread.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` for non-admins, `AppError::Conflict` if the
    /// thread is closed or another admin already joined.
    #[tracing::instrument(err(level = "warn"), skip(self, actor), fields(user_id = actor.id))]
    pub async fn join_thread(&self, actor: Actor, thread_id: i64) -> Result<ChatThread> {
        if !actor.is_admin() {
            return Err(self.deny("join"));
        }

        let mut conn = self.pool.acquire().await?;
        let thread = self.load(&mut conn, thread_id).await?;
        if thread.admin_id == Some(actor.id) {
            return Ok(thread);
        }

        match self.threads.assign_admin(&mut conn, thread_id, actor.id).await? {
            Some(thread) => {
                tracing::info!(thread_id, "Admin joined chat thread");
                Ok(thread)
            }
            None if !thread.is_open() => Err(AppError::Conflict("Chat is closed".into())),
            None => Err(AppError::Conflict("Chat already has an admin".into())),
        }
    }

    /// Lists messages newest first; `before` is the id of the oldest message already seen.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    #[tracing::instrument(err(level = "warn"), skip(self, actor), fields(user_id = actor.id))]
    pub async fn list_messages(
        &self,
        actor: Actor,
        thread_id: i64,
        before: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>> {
        let mut conn = self.pool.acquire().await?;
        let thread = self.load(&mut conn, thread_id).await?;
        if !self.policy().view(&actor, &thread) {
            return Err(self.deny("view"));
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.messages.fetch_page(&mut conn, thread_id, before, limit).await
    }

    /// # Errors
    /// Returns `AppError::BadRequest` for malformed drafts, `AppError::Forbidden`
    /// if the actor may not post (including on closed threads).
    #[tracing::instrument(err(level = "warn"), skip(self, actor, draft), fields(user_id = actor.id))]
    pub async fn post_message(&self, actor: Actor, thread_id: i64, draft: MessageDraft) -> Result<ChatMessage> {
        let mut conn = self.pool.acquire().await?;
        let thread = self.load(&mut conn, thread_id).await?;
        if !self.policy().post(&actor, &thread) {
            return Err(self.deny("post"));
        }

        draft.validate(&media_prefix(&self.config.media_root, thread_id)).map_err(AppError::BadRequest)?;

        let message = self.messages.create(&mut conn, thread_id, actor.id, draft).await?;
        self.metrics.messages_posted.add(1, &[]);
        Ok(message)
    }

    /// Stores a media object inside the thread's prefix and returns its key.
    ///
    /// # Errors
    /// Returns `AppError::PayloadTooLarge`, `AppError::BadRequest` for an empty
    /// body, `AppError::Forbidden`, or `AppError::Storage`.
    #[tracing::instrument(err(level = "warn"), skip(self, actor, body), fields(user_id = actor.id, size = body.len()))]
    pub async fn upload_media(
        &self,
        actor: Actor,
        thread_id: i64,
        body: Bytes,
        content_type: Option<String>,
    ) -> Result<String> {
        if body.is_empty() {
            return Err(AppError::BadRequest("Empty upload".into()));
        }
        if body.len() > self.config.max_media_bytes {
            return Err(AppError::PayloadTooLarge);
        }

        let thread = {
            let mut conn = self.pool.acquire().await?;
            self.load(&mut conn, thread_id).await?
        };
        if !self.policy().post(&actor, &thread) {
            return Err(self.deny("upload"));
        }

        let key = format!("{}{}", media_prefix(&self.config.media_root, thread_id), Uuid::new_v4());
        self.storage.put(&key, body, content_type.as_deref()).await?;
        Ok(key)
    }

    /// Closes the thread and schedules its media purge.
    ///
    /// The purge job is dispatched only by the call that performs the
    /// `open -> closed` transition; closing a closed thread returns it as is.
    ///
    /// # Errors
    /// Returns `AppError::NotFound`, `AppError::Forbidden`, or `AppError::Queue`
    /// if the purge job cannot be enqueued.
    #[tracing::instrument(err(level = "warn"), skip(self, actor), fields(user_id = actor.id))]
    pub async fn close_thread(&self, actor: Actor, thread_id: i64) -> Result<ChatThread> {
        let mut tx = self.pool.begin().await?;
        let thread = self.load(&mut *tx, thread_id).await?;
        if !self.policy().close(&actor, &thread) {
            return Err(self.deny("close"));
        }

        let Some(closed) = self.threads.close(&mut *tx, thread_id).await? else {
            tracing::debug!("Thread already closed");
            return Ok(thread);
        };

        // Enqueue before commit: if the queue is down the thread stays open and the caller can retry
        self.dispatcher.dispatch(JobPayload::CloseChatAndPurgeMedia { thread_id }).await?;
        tx.commit().await?;

        self.metrics.threads_closed.add(1, &[]);
        tracing::info!(request_id = closed.request_id, "Chat thread closed");
        Ok(closed)
    }
}
