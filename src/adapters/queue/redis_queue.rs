use crate::adapters::queue::JobQueue;
use crate::adapters::redis::RedisClient;
use crate::domain::job::{FailedJob, Job};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Claims due members and pushes their score past the visibility window in one step,
// so two workers can never lease the same job.
const LEASE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, id in ipairs(due) do
    redis.call('ZADD', KEYS[1], 'XX', ARGV[3], id)
end
return due
";

/// Queue layout: a sorted set of job ids scored by due time (unix seconds),
/// a hash of job id to JSON payload, and a hash of failed jobs.
#[derive(Debug, Clone)]
pub struct RedisJobQueue {
    redis: Arc<RedisClient>,
    due_key: String,
    payload_key: String,
    failed_key: String,
    lease_script: redis::Script,
}

#[allow(clippy::cast_precision_loss)]
fn score_after(delay: Duration) -> f64 {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    (now + i64::try_from(delay.as_secs()).unwrap_or(i64::MAX / 2)) as f64
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Queue(format!("Failed to encode job: {e}")))
}

impl RedisJobQueue {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, key_prefix: &str) -> Self {
        Self {
            redis,
            due_key: format!("{key_prefix}:due"),
            payload_key: format!("{key_prefix}:payloads"),
            failed_key: format!("{key_prefix}:failed"),
            lease_script: redis::Script::new(LEASE_SCRIPT),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[tracing::instrument(level = "debug", skip(self, job), fields(job.id = %job.id, job.name = job.payload.name()))]
    async fn enqueue(&self, job: &Job, delay: Duration) -> Result<()> {
        let payload = encode(job)?;
        let mut conn = self.redis.connection();
        redis::pipe()
            .atomic()
            .hset(&self.payload_key, job.id.to_string(), payload)
            .ignore()
            .zadd(&self.due_key, job.id.to_string(), score_after(delay))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn lease_due(&self, limit: usize, visibility: Duration) -> Result<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.connection();
        let ids: Vec<String> = self
            .lease_script
            .key(&self.due_key)
            .arg(score_after(Duration::ZERO))
            .arg(limit)
            .arg(score_after(visibility))
            .invoke_async(&mut conn)
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let payloads: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&self.payload_key)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for (id, payload) in ids.iter().zip(payloads) {
            match payload.map(|p| serde_json::from_str::<Job>(&p)) {
                Some(Ok(job)) => jobs.push(job),
                Some(Err(e)) => {
                    tracing::error!(error = %e, job.id = %id, "Dropping undecodable job");
                    let _: () = redis::pipe()
                        .zrem(&self.due_key, id)
                        .ignore()
                        .hdel(&self.payload_key, id)
                        .ignore()
                        .query_async(&mut conn)
                        .await?;
                }
                None => {
                    tracing::warn!(job.id = %id, "Queue entry without payload, removing");
                    let _: i64 = conn.zrem(&self.due_key, id).await?;
                }
            }
        }

        Ok(jobs)
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        let id = job_id.to_string();
        let mut conn = self.redis.connection();
        redis::pipe()
            .atomic()
            .zrem(&self.due_key, &id)
            .ignore()
            .hdel(&self.payload_key, &id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn release(&self, job: &Job, delay: Duration) -> Result<()> {
        self.enqueue(job, delay).await
    }

    #[tracing::instrument(level = "debug", skip(self, failed), fields(job.id = %failed.job.id))]
    async fn bury(&self, failed: &FailedJob) -> Result<()> {
        let id = failed.job.id.to_string();
        let payload = encode(failed)?;
        let mut conn = self.redis.connection();
        redis::pipe()
            .atomic()
            .zrem(&self.due_key, &id)
            .ignore()
            .hdel(&self.payload_key, &id)
            .ignore()
            .hset(&self.failed_key, &id, payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>> {
        let mut conn = self.redis.connection();
        let payloads: Vec<String> = conn.hvals(&self.failed_key).await?;

        let mut failed: Vec<FailedJob> = payloads
            .iter()
            .filter_map(|p| {
                serde_json::from_str(p)
                    .inspect_err(|e| tracing::warn!(error = %e, "Skipping undecodable failed job"))
                    .ok()
            })
            .collect();
        failed.sort_by(|a: &FailedJob, b: &FailedJob| b.failed_at.cmp(&a.failed_at));
        failed.truncate(limit);
        Ok(failed)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn retry_failed(&self, job_id: Uuid) -> Result<bool> {
        let id = job_id.to_string();
        let mut conn = self.redis.connection();
        let payload: Option<String> = conn.hget(&self.failed_key, &id).await?;
        let Some(payload) = payload else {
            return Ok(false);
        };

        let failed: FailedJob =
            serde_json::from_str(&payload).map_err(|e| AppError::Queue(format!("Corrupt failed job {id}: {e}")))?;
        let job = Job { attempts: 0, ..failed.job };

        redis::pipe()
            .atomic()
            .hdel(&self.failed_key, &id)
            .ignore()
            .hset(&self.payload_key, &id, encode(&job)?)
            .ignore()
            .zadd(&self.due_key, &id, score_after(Duration::ZERO))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        self.redis.ping().await.map_err(|e| AppError::Queue(e.to_string()))
    }
}
