#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::DbPool;
use crate::adapters::database::chat_message_repo::ChatMessageRepository;
use crate::adapters::database::chat_records::PgChatRecords;
use crate::adapters::database::chat_thread_repo::ChatThreadRepository;
use crate::adapters::queue::JobQueue;
use crate::adapters::storage::ObjectStorage;
use crate::config::{ChatFlags, Config, StorageConfig};
use crate::domain::job::RetryPolicy;
use crate::services::chat_purge::ChatPurgeHandler;
use crate::services::chat_service::ChatService;
use crate::services::health_service::HealthService;
use crate::services::job_dispatcher::JobDispatcher;
use crate::workers::JobWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fully wired application: request-facing services plus the background workers.
#[derive(Debug)]
pub struct App {
    pub chat_service: ChatService,
    pub health_service: HealthService,
    pub queue: Arc<dyn JobQueue>,
    pub workers: Workers,
}

/// Background tasks that run until shutdown is signalled.
#[derive(Debug)]
pub struct Workers {
    job_worker: JobWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let job_worker = self.job_worker;
        vec![tokio::spawn(async move { job_worker.run(shutdown).await })]
    }
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    storage: Option<Arc<dyn ObjectStorage>>,
    queue: Option<Arc<dyn JobQueue>>,
    flags: Option<watch::Receiver<ChatFlags>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, storage: None, queue: None, flags: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Subscribes the app to runtime flag updates. Without this the flags stay at their configured values.
    #[must_use]
    pub fn with_flags(mut self, flags: watch::Receiver<ChatFlags>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Wires repositories, services and workers together.
    ///
    /// # Errors
    /// Returns an error if a required component was not supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("Database pool is required"))?;
        let storage = self.storage.ok_or_else(|| anyhow::anyhow!("Object storage is required"))?;
        let queue = self.queue.ok_or_else(|| anyhow::anyhow!("Job queue is required"))?;
        let flags = self.flags.unwrap_or_else(|| watch::channel(self.config.chat.flags()).1);

        let threads = ChatThreadRepository::new();
        let messages = ChatMessageRepository::new();

        let dispatcher = JobDispatcher::new(Arc::clone(&queue));
        let chat_service = ChatService::new(
            pool.clone(),
            threads,
            messages,
            Arc::clone(&storage),
            dispatcher,
            flags.clone(),
            self.config.chat.clone(),
        );

        let records = Arc::new(PgChatRecords::new(pool.clone(), threads, messages));
        let purge =
            ChatPurgeHandler::new(records, Arc::clone(&storage), flags, self.config.chat.media_root.clone());

        let queue_config = &self.config.queue;
        let job_worker = JobWorker::new(
            Arc::clone(&queue),
            purge,
            RetryPolicy::from_secs(&queue_config.backoff_secs, queue_config.max_attempts),
            queue_config.worker_concurrency,
            Duration::from_millis(queue_config.poll_interval_ms),
            Duration::from_secs(queue_config.visibility_timeout_secs),
        );

        let health_service = HealthService::new(pool, storage, Arc::clone(&queue), self.config.health.clone());

        Ok(App { chat_service, health_service, queue, workers: Workers { job_worker } })
    }
}

/// Applies pending database migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, draining...");
        let _ = shutdown_tx.send(true);
    });
}

/// Builds the S3 client. Static credentials are used when both keys are configured,
/// otherwise the default AWS provider chain applies.
pub async fn initialize_s3_client(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(aws_credential_types::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style).build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info.location().map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        tracing::error!(panic = %panic_info, location = ?location, "Process panicked");
    }));
}
