use crate::adapters::queue::JobQueue;
use crate::config::{ChatFlags, Config};
use crate::services::chat_service::ChatService;
use crate::services::health_service::HealthService;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod chats;
pub mod flags;
pub mod health;
pub mod jobs;
pub mod middleware;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub chat_service: ChatService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
    pub queue: Arc<dyn JobQueue>,
    pub flags: Arc<watch::Sender<ChatFlags>>,
}

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Configures and returns the public chat router.
pub fn app_router(config: Config, chat_service: ChatService) -> Router {
    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
    let max_media_bytes = config.chat.max_media_bytes;
    let state = AppState { config, chat_service };

    let chat_routes = Router::new()
        .route("/chats", post(chats::open_thread))
        .route("/chats/{id}", get(chats::get_thread))
        .route("/chats/{id}/join", post(chats::join_thread))
        .route("/chats/{id}/close", post(chats::close_thread))
        .route("/chats/{id}/messages", get(chats::list_messages).post(chats::post_message))
        .route("/chats/{id}/media", post(chats::upload_media).layer(DefaultBodyLimit::max(max_media_bytes)));

    Router::new()
        .nest("/v1", chat_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(axum::http::HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid))
        .with_state(state)
}

/// Operator-only router: probes, failed-job inspection and runtime chat flags.
pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/jobs/failed", get(jobs::list_failed))
        .route("/jobs/failed/{id}/retry", post(jobs::retry_failed))
        .route("/chat/flags", get(flags::get_flags).put(flags::put_flags))
        .with_state(state)
}
