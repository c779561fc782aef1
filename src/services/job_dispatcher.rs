use crate::adapters::queue::JobQueue;
use crate::domain::job::{Job, JobPayload};
use crate::error::Result;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    dispatched: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("carechat-server");
        Self {
            dispatched: meter
                .u64_counter("carechat_jobs_dispatched_total")
                .with_description("Total number of jobs placed on the queue")
                .build(),
        }
    }
}

/// Producer side of the job queue.
#[derive(Clone, Debug)]
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    metrics: Metrics,
}

impl JobDispatcher {
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue, metrics: Metrics::new() }
    }

    /// Places a new job on the queue, due immediately.
    ///
    /// # Errors
    /// Returns `AppError::Queue` if the queue rejects the job.
    #[tracing::instrument(err, skip(self), fields(job.id = tracing::field::Empty))]
    pub async fn dispatch(&self, payload: JobPayload) -> Result<Job> {
        let job = Job::new(payload);
        tracing::Span::current().record("job.id", tracing::field::display(job.id));

        self.queue.enqueue(&job, Duration::ZERO).await?;
        self.metrics.dispatched.add(1, &[KeyValue::new("job", payload.name())]);
        tracing::debug!("Job dispatched");
        Ok(job)
    }
}
