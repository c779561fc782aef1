use crate::domain::job::{FailedJob, Job};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

pub mod redis_queue;

pub use redis_queue::RedisJobQueue;

/// Delayed job queue with visibility-timeout leases and a failed-job store.
#[async_trait]
pub trait JobQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Makes a job due after `delay`.
    async fn enqueue(&self, job: &Job, delay: Duration) -> Result<()>;

    /// Claims up to `limit` due jobs. A claimed job becomes due again after
    /// `visibility` unless it is completed, released or buried first.
    async fn lease_due(&self, limit: usize, visibility: Duration) -> Result<Vec<Job>>;

    async fn complete(&self, job_id: Uuid) -> Result<()>;

    /// Stores the updated job and reschedules it after `delay`.
    async fn release(&self, job: &Job, delay: Duration) -> Result<()>;

    /// Removes a job from the queue and records it as permanently failed.
    async fn bury(&self, failed: &FailedJob) -> Result<()>;

    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>>;

    /// Moves a failed job back onto the queue with a fresh attempt budget.
    /// Returns `false` when no failed job has that id.
    async fn retry_failed(&self, job_id: Uuid) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}
