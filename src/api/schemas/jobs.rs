use crate::domain::job::{FailedJob, JobPayload};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJobResponse {
    pub id: Uuid,
    pub payload: JobPayload,
    pub attempts: u32,
    pub error: String,
    #[serde(with = "time::serde::timestamp")]
    pub queued_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub failed_at: OffsetDateTime,
}

impl From<FailedJob> for FailedJobResponse {
    fn from(failed: FailedJob) -> Self {
        Self {
            id: failed.job.id,
            payload: failed.job.payload,
            attempts: failed.job.attempts,
            error: failed.error,
            queued_at: failed.job.queued_at,
            failed_at: failed.failed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FailedJobsQuery {
    pub limit: Option<usize>,
}
