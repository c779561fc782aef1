use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub chat: ChatConfig,

    #[command(flatten)]
    pub queue: QueueConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub health: HealthConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(id = "database_url", long = "database-url", env = "CARECHAT_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "CARECHAT_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long, env = "CARECHAT_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a connection before giving up
    #[arg(long, env = "CARECHAT_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds an idle connection may live
    #[arg(long, env = "CARECHAT_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a connection in seconds
    #[arg(long, env = "CARECHAT_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "CARECHAT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "CARECHAT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management API (health probes, failed jobs, flags)
    #[arg(long, env = "CARECHAT_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks on shutdown
    #[arg(long, env = "CARECHAT_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "CARECHAT_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret used to verify HS256 bearer tokens issued by the main backend
    #[arg(long, env = "CARECHAT_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct ChatConfig {
    /// Enables chat for non-admin users
    #[arg(id = "chat_enabled", long = "chat-enabled", env = "CARECHAT_CHAT_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub enabled: bool,

    /// Null out message text, media and location when a thread is purged
    #[arg(long, env = "CARECHAT_REDACT_MESSAGES", default_value_t = true, action = clap::ArgAction::Set)]
    pub redact_messages: bool,

    /// Storage prefix under which each thread keeps its media (`{root}/{thread_id}/`)
    #[arg(long, env = "CARECHAT_MEDIA_ROOT", default_value = "chats")]
    pub media_root: String,

    /// Max media upload size in bytes (Default: 20MB)
    #[arg(long, env = "CARECHAT_MAX_MEDIA_BYTES", default_value_t = 20_971_520)]
    pub max_media_bytes: usize,
}

impl ChatConfig {
    #[must_use]
    pub const fn flags(&self) -> ChatFlags {
        ChatFlags { enabled: self.enabled, redact_messages: self.redact_messages }
    }
}

/// Runtime-switchable chat behavior.
///
/// Seeded from [`ChatConfig`] at startup and then distributed through a
/// `tokio::sync::watch` channel, so consumers always see the latest value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFlags {
    pub enabled: bool,
    pub redact_messages: bool,
}

impl Default for ChatFlags {
    fn default() -> Self {
        Self { enabled: true, redact_messages: true }
    }
}

#[derive(Clone, Debug, Args)]
pub struct QueueConfig {
    /// Redis URL backing the job queue
    #[arg(id = "queue_url", long = "queue-url", env = "CARECHAT_QUEUE_URL", default_value = "redis://localhost:6379")]
    pub url: String,

    /// Key prefix for queue data structures
    #[arg(long, env = "CARECHAT_QUEUE_KEY", default_value = "carechat:jobs")]
    pub queue_key: String,

    /// Number of jobs a worker runs concurrently
    #[arg(long, env = "CARECHAT_WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// How often the worker polls for due jobs
    #[arg(long, env = "CARECHAT_WORKER_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Seconds a leased job stays invisible before another worker may pick it up
    #[arg(long, env = "CARECHAT_VISIBILITY_TIMEOUT_SECS", default_value_t = 600)]
    pub visibility_timeout_secs: u64,

    /// Maximum number of attempts before a job is moved to the failed store
    #[arg(long, env = "CARECHAT_JOB_MAX_ATTEMPTS", default_value_t = 5)]
    pub max_attempts: u32,

    /// Comma-separated delays (seconds) applied after each failed attempt
    #[arg(long, env = "CARECHAT_JOB_BACKOFF_SECS", default_value = "5,30,60,120,300", value_delimiter = ',')]
    pub backoff_secs: Vec<u64>,

    /// Minimum delay between connection attempts to Redis
    #[arg(long, env = "CARECHAT_QUEUE_MIN_BACKOFF_SECS", default_value_t = 1)]
    pub min_backoff_secs: u64,

    /// Maximum delay between connection attempts to Redis
    #[arg(long, env = "CARECHAT_QUEUE_MAX_BACKOFF_SECS", default_value_t = 30)]
    pub max_backoff_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// S3 bucket name
    #[arg(long, env = "CARECHAT_S3_BUCKET")]
    pub bucket: String,

    /// S3 region
    #[arg(long, env = "CARECHAT_S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long, env = "CARECHAT_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 access key
    #[arg(long, env = "CARECHAT_S3_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "CARECHAT_S3_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long, env = "CARECHAT_S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; telemetry export is disabled when unset
    #[arg(long, env = "CARECHAT_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "CARECHAT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check
    #[arg(long, env = "CARECHAT_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,

    /// Timeout for the storage readiness check
    #[arg(long, env = "CARECHAT_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,

    /// Timeout for the queue readiness check
    #[arg(long, env = "CARECHAT_HEALTH_QUEUE_TIMEOUT_MS", default_value_t = 2000)]
    pub queue_timeout_ms: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
