#![allow(clippy::unwrap_used, clippy::panic, clippy::todo)]

mod common;

use carechat_server::adapters::queue::{JobQueue, RedisJobQueue};
use carechat_server::adapters::redis::RedisClient;
use carechat_server::domain::job::{FailedJob, Job, JobPayload};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

async fn queue() -> RedisJobQueue {
    common::setup_tracing();
    let mut config = common::get_test_config();
    if let Ok(url) = std::env::var("REDIS_URL") {
        config.queue.url = url;
    }
    let redis = RedisClient::new(&config.queue).await.expect("Failed to connect to Redis. Is it running?");
    // Unique prefix so parallel tests never see each other's jobs
    RedisJobQueue::new(redis, &format!("test:{}", Uuid::new_v4()))
}

fn job(thread_id: i64) -> Job {
    Job::new(JobPayload::CloseChatAndPurgeMedia { thread_id })
}

#[tokio::test]
async fn test_lease_hides_job_until_visibility_expires() {
    let queue = queue().await;
    let job = job(1);
    queue.enqueue(&job, Duration::ZERO).await.unwrap();

    let leased = queue.lease_due(10, Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased, vec![job.clone()]);
    assert!(queue.lease_due(10, Duration::from_secs(1)).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    let again = queue.lease_due(10, Duration::from_secs(60)).await.unwrap();
    assert_eq!(again.len(), 1, "An expired lease must make the job due again");

    queue.complete(job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(queue.lease_due(10, Duration::ZERO).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delayed_job_is_not_due_early() {
    let queue = queue().await;
    queue.enqueue(&job(2), Duration::from_secs(30)).await.unwrap();
    assert!(queue.lease_due(10, Duration::from_secs(60)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_release_keeps_attempt_count() {
    let queue = queue().await;
    let job = job(3);
    queue.enqueue(&job, Duration::ZERO).await.unwrap();
    let leased = queue.lease_due(1, Duration::from_secs(60)).await.unwrap().remove(0);

    queue.release(&leased.with_failed_attempt(), Duration::ZERO).await.unwrap();

    let again = queue.lease_due(1, Duration::from_secs(60)).await.unwrap();
    assert_eq!(again[0].id, job.id);
    assert_eq!(again[0].attempts, 1);
}

#[tokio::test]
async fn test_bury_and_redrive() {
    let queue = queue().await;
    let job = Job { attempts: 5, ..job(4) };
    queue.enqueue(&job, Duration::ZERO).await.unwrap();

    queue
        .bury(&FailedJob { job: job.clone(), error: "boom".into(), failed_at: OffsetDateTime::now_utc() })
        .await
        .unwrap();
    assert!(queue.lease_due(10, Duration::from_secs(60)).await.unwrap().is_empty());

    let failed = queue.failed_jobs(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error, "boom");

    assert!(queue.retry_failed(job.id).await.unwrap());
    assert!(queue.failed_jobs(10).await.unwrap().is_empty());

    let redriven = queue.lease_due(10, Duration::from_secs(60)).await.unwrap();
    assert_eq!(redriven.len(), 1);
    assert_eq!(redriven[0].attempts, 0);
    assert!(!queue.retry_failed(Uuid::new_v4()).await.unwrap());
}
