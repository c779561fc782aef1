use crate::adapters::database::DbPool;
use crate::adapters::queue::JobQueue;
use crate::adapters::storage::ObjectStorage;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("carechat-server");
        Self {
            status: meter
                .i64_gauge("carechat_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    storage: Arc<dyn ObjectStorage>,
    queue: Arc<dyn JobQueue>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, storage: Arc<dyn ObjectStorage>, queue: Arc<dyn JobQueue>, config: HealthConfig) -> Self {
        Self { pool, storage, queue, config, metrics: Metrics::new() }
    }

    fn record(&self, component: &'static str, ok: bool) {
        self.metrics.status.record(i64::from(ok), &[KeyValue::new("component", component)]);
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        let result = match timeout(db_timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e:?}")),
            Err(_) => Err("Database connection timed out".to_string()),
        };
        self.record("database", result.is_ok());
        result
    }

    /// Checks object storage connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the bucket is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);

        let result = match timeout(storage_timeout, self.storage.check()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Storage connection failed: {e}")),
            Err(_) => Err("Storage connection timed out".to_string()),
        };
        self.record("storage", result.is_ok());
        result
    }

    /// Checks job queue connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the queue is unreachable.
    pub async fn check_queue(&self) -> Result<(), String> {
        let queue_timeout = Duration::from_millis(self.config.queue_timeout_ms);

        let result = match timeout(queue_timeout, self.queue.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Queue connection failed: {e}")),
            Err(_) => Err("Queue connection timed out".to_string()),
        };
        self.record("queue", result.is_ok());
        result
    }
}
