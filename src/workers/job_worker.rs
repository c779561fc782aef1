use crate::adapters::queue::JobQueue;
use crate::domain::job::{FailedJob, Job, JobPayload, RetryPolicy};
use crate::error::Result;
use crate::services::chat_purge::ChatPurgeHandler;
use futures::StreamExt;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    completed: Counter<u64>,
    retried: Counter<u64>,
    buried: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("carechat-server");
        Self {
            completed: meter
                .u64_counter("carechat_jobs_completed_total")
                .with_description("Total number of jobs that finished successfully")
                .build(),
            retried: meter
                .u64_counter("carechat_jobs_retried_total")
                .with_description("Total number of failed attempts rescheduled with backoff")
                .build(),
            buried: meter
                .u64_counter("carechat_jobs_failed_total")
                .with_description("Total number of jobs moved to the failed store after exhausting attempts")
                .build(),
        }
    }
}

/// What happened to a leased job after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Completed,
    Retrying { attempts: u32, delay: Duration },
    Failed { attempts: u32 },
}

#[derive(Debug)]
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    purge: ChatPurgeHandler,
    retry: RetryPolicy,
    concurrency: usize,
    poll_interval: Duration,
    visibility_timeout: Duration,
    metrics: Metrics,
}

impl JobWorker {
    #[must_use]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        purge: ChatPurgeHandler,
        retry: RetryPolicy,
        concurrency: usize,
        poll_interval: Duration,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            purge,
            retry,
            concurrency: concurrency.max(1),
            poll_interval,
            visibility_timeout,
            metrics: Metrics::new(),
        }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_due_jobs()
                        .instrument(tracing::debug_span!("job_worker_iteration"))
                        .await
                    {
                        tracing::error!(error = %e, "Failed to process due jobs");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("Job worker shutting down...");
    }

    /// Leases up to `concurrency` due jobs and runs them to an outcome.
    ///
    /// Returns the number of jobs processed.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be polled.
    pub async fn process_due_jobs(&self) -> Result<usize> {
        let jobs = self.queue.lease_due(self.concurrency, self.visibility_timeout).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = jobs.len(), "Processing leased jobs");
        let count = jobs.len();

        futures::stream::iter(jobs)
            .for_each_concurrent(self.concurrency, |job| async move {
                let span = tracing::info_span!(
                    "run_job",
                    job.id = %job.id,
                    job.name = job.payload.name(),
                    job.attempt = job.attempts + 1
                );
                if let Err(e) = self.run_job(job).instrument(span).await {
                    tracing::error!(error = %e, "Failed to record job outcome");
                }
            })
            .await;

        Ok(count)
    }

    /// Runs one attempt of a job and records the outcome on the queue.
    ///
    /// # Errors
    /// Returns an error only if the queue cannot record the outcome; the
    /// lease then expires and the attempt is repeated.
    pub async fn run_job(&self, job: Job) -> Result<JobResult> {
        let outcome = match job.payload {
            JobPayload::CloseChatAndPurgeMedia { thread_id } => self.purge.handle(thread_id).await.map(|_| ()),
        };

        let error = match outcome {
            Ok(()) => {
                self.queue.complete(job.id).await?;
                self.metrics.completed.add(1, &[KeyValue::new("job", job.payload.name())]);
                return Ok(JobResult::Completed);
            }
            Err(e) => e,
        };

        let failed = job.with_failed_attempt();
        if let Some(delay) = self.retry.next_delay(failed.attempts) {
            tracing::warn!(error = %error, attempts = failed.attempts, retry_in = ?delay, "Job attempt failed, will retry");
            self.queue.release(&failed, delay).await?;
            self.metrics.retried.add(1, &[KeyValue::new("job", job.payload.name())]);
            return Ok(JobResult::Retrying { attempts: failed.attempts, delay });
        }

        tracing::error!(error = %error, attempts = failed.attempts, "Job exhausted its attempts");
        let attempts = failed.attempts;
        self.queue
            .bury(&FailedJob { job: failed, error: error.to_string(), failed_at: OffsetDateTime::now_utc() })
            .await?;
        self.metrics.buried.add(1, &[KeyValue::new("job", job.payload.name())]);
        Ok(JobResult::Failed { attempts })
    }
}
