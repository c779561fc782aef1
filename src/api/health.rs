use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks connectivity to the database, storage and queue.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (db_res, storage_res, queue_res) = tokio::join!(
        state.health_service.check_db(),
        state.health_service.check_storage(),
        state.health_service.check_queue()
    );

    let mut status_code = StatusCode::OK;
    let mut component_status = |component: &'static str, res: Result<(), String>| {
        if let Err(e) = res {
            tracing::warn!(error = %e, component, "Readiness probe failed");
            status_code = StatusCode::SERVICE_UNAVAILABLE;
            "error".to_string()
        } else {
            "ok".to_string()
        }
    };

    let database = component_status("database", db_res);
    let storage = component_status("storage", storage_res);
    let queue = component_status("queue", queue_res);

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        database,
        storage,
        queue,
    };

    (status_code, Json(response))
}
