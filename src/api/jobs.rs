use crate::api::MgmtState;
use crate::api::schemas::jobs::{FailedJobResponse, FailedJobsQuery};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

const DEFAULT_FAILED_LIMIT: usize = 100;

/// Lists jobs that exhausted their attempts, most recent first.
///
/// # Errors
/// Returns `AppError::Queue` if the queue is unreachable.
pub async fn list_failed(
    State(state): State<MgmtState>,
    Query(query): Query<FailedJobsQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_FAILED_LIMIT).clamp(1, 1000);
    let failed = state.queue.failed_jobs(limit).await?;
    Ok(Json(failed.into_iter().map(FailedJobResponse::from).collect::<Vec<_>>()))
}

/// Puts a failed job back on the queue with a fresh attempt budget.
///
/// # Errors
/// Returns `AppError::NotFound` if no failed job has this id.
pub async fn retry_failed(State(state): State<MgmtState>, Path(job_id): Path<Uuid>) -> Result<impl IntoResponse> {
    if !state.queue.retry_failed(job_id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(job.id = %job_id, "Failed job re-queued by operator");
    Ok(StatusCode::ACCEPTED)
}
