#![allow(clippy::unwrap_used, clippy::panic, clippy::todo)]

mod common;

use carechat_server::adapters::queue::JobQueue;
use carechat_server::api::schemas::jobs::FailedJobResponse;
use carechat_server::api::{MgmtState, mgmt_router};
use carechat_server::config::ChatFlags;
use carechat_server::domain::job::{FailedJob, Job, JobPayload};
use carechat_server::services::health_service::HealthService;
use common::{MemoryJobQueue, MemoryStorage};
use reqwest::StatusCode;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct MgmtApp {
    url: String,
    queue: Arc<MemoryJobQueue>,
    flags: watch::Receiver<ChatFlags>,
}

async fn spawn_mgmt() -> MgmtApp {
    common::setup_tracing();
    let config = common::get_test_config();
    // Never connected; only the readiness probe would touch it
    let pool = PgPoolOptions::new().connect_lazy(&config.database.url).unwrap();
    let queue = Arc::new(MemoryJobQueue::default());
    let flags = Arc::new(watch::Sender::new(ChatFlags::default()));
    let flags_rx = flags.subscribe();

    let state = MgmtState {
        health_service: HealthService::new(
            pool,
            Arc::new(MemoryStorage::default()),
            Arc::clone(&queue) as _,
            config.health.clone(),
        ),
        queue: Arc::clone(&queue) as _,
        flags,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, mgmt_router(state)).await.unwrap();
    });

    MgmtApp { url: format!("http://{addr}"), queue, flags: flags_rx }
}

#[tokio::test]
async fn test_livez_is_always_ok() {
    let app = spawn_mgmt().await;
    let resp = reqwest::get(format!("{}/livez", app.url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_flags_can_be_read_and_replaced() {
    let app = spawn_mgmt().await;
    let client = reqwest::Client::new();

    let current: ChatFlags = client.get(format!("{}/chat/flags", app.url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(current, ChatFlags { enabled: true, redact_messages: true });

    let resp = client
        .put(format!("{}/chat/flags", app.url))
        .json(&json!({ "enabled": false, "redactMessages": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(*app.flags.borrow(), ChatFlags { enabled: false, redact_messages: true });
}

#[tokio::test]
async fn test_failed_jobs_can_be_listed_and_redriven() {
    let app = spawn_mgmt().await;
    let client = reqwest::Client::new();

    let job = Job { attempts: 5, ..Job::new(JobPayload::CloseChatAndPurgeMedia { thread_id: 3 }) };
    app.queue
        .bury(&FailedJob { job: job.clone(), error: "Storage error: bucket gone".into(), failed_at: OffsetDateTime::now_utc() })
        .await
        .unwrap();

    let failed: Vec<FailedJobResponse> =
        client.get(format!("{}/jobs/failed", app.url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, job.id);
    assert_eq!(failed[0].attempts, 5);

    let resp = client.post(format!("{}/jobs/failed/{}/retry", app.url, job.id)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let pending = app.queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 0);

    let resp = client.post(format!("{}/jobs/failed/{}/retry", app.url, job.id)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
