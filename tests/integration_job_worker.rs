#![allow(clippy::unwrap_used, clippy::panic, clippy::todo)]

mod common;

use carechat_server::adapters::queue::JobQueue;
use carechat_server::config::ChatFlags;
use carechat_server::domain::chat::ThreadStatus;
use carechat_server::domain::job::{JobPayload, RetryPolicy};
use carechat_server::services::chat_purge::ChatPurgeHandler;
use carechat_server::services::job_dispatcher::JobDispatcher;
use carechat_server::workers::{JobResult, JobWorker};
use common::{MemoryChatRecords, MemoryJobQueue, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

struct Harness {
    queue: Arc<MemoryJobQueue>,
    storage: Arc<MemoryStorage>,
    records: Arc<MemoryChatRecords>,
    worker: JobWorker,
}

fn harness() -> Harness {
    common::setup_tracing();
    let queue = Arc::new(MemoryJobQueue::default());
    let storage = Arc::new(MemoryStorage::default());
    let records = Arc::new(MemoryChatRecords::default());
    records.add_thread(common::thread(1, 42, 2, ThreadStatus::Closed));
    records.add_message(common::message(1, 1, "hi", Some("chats/1/photo.jpg")));
    storage.insert("chats/1/photo.jpg");

    let (_, flags) = watch::channel(ChatFlags::default());
    let purge = ChatPurgeHandler::new(Arc::clone(&records) as _, Arc::clone(&storage) as _, flags, "chats".to_string());
    let worker = JobWorker::new(
        Arc::clone(&queue) as _,
        purge,
        RetryPolicy::default(),
        4,
        Duration::from_millis(100),
        Duration::from_secs(600),
    );
    Harness { queue, storage, records, worker }
}

async fn dispatch(h: &Harness) {
    let dispatcher = JobDispatcher::new(Arc::clone(&h.queue) as _);
    dispatcher.dispatch(JobPayload::CloseChatAndPurgeMedia { thread_id: 1 }).await.unwrap();
}

/// Polls until the queue has nothing pending, on tokio's paused clock.
async fn drain(h: &Harness) {
    for _ in 0..10_000 {
        h.worker.process_due_jobs().await.unwrap();
        if h.queue.pending().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("queue did not drain");
}

#[tokio::test(start_paused = true)]
async fn test_job_succeeds_after_two_failures_with_backoff() {
    let h = harness();
    h.storage.fail_next(2);
    dispatch(&h).await;

    let start = Instant::now();
    drain(&h).await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(35), "retried too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(36), "retried too late: {elapsed:?}");
    assert_eq!(h.queue.release_delays(), vec![Duration::from_secs(5), Duration::from_secs(30)]);
    assert!(h.queue.failed().is_empty());
    assert!(h.storage.keys().is_empty());
    assert!(h.records.messages(1).iter().all(|m| m.is_redacted()));
}

#[tokio::test(start_paused = true)]
async fn test_job_is_buried_after_five_attempts() {
    let h = harness();
    h.storage.fail_next(usize::MAX);
    dispatch(&h).await;

    drain(&h).await;

    assert_eq!(
        h.queue.release_delays(),
        [5, 30, 60, 120].map(Duration::from_secs).to_vec(),
        "The fifth failure must not be rescheduled"
    );
    assert_eq!(h.storage.delete_calls(), 5);

    let failed = h.queue.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].job.attempts, 5);
    assert!(failed[0].error.contains("injected storage failure"));
    assert!(h.records.messages(1).iter().all(|m| !m.is_redacted()));
}

#[tokio::test(start_paused = true)]
async fn test_buried_job_can_be_retried_by_operator() {
    let h = harness();
    h.storage.fail_next(5);
    dispatch(&h).await;
    drain(&h).await;

    let failed = h.queue.failed();
    assert_eq!(failed.len(), 1);
    assert!(h.queue.retry_failed(failed[0].job.id).await.unwrap());
    assert!(!h.queue.retry_failed(failed[0].job.id).await.unwrap());

    drain(&h).await;
    assert!(h.queue.failed().is_empty());
    assert!(h.storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_job_leased_before_close_commits_is_retried() {
    let h = harness();
    h.records.set_status(1, ThreadStatus::Open);
    dispatch(&h).await;

    // The worker picks the job up while the closing transaction is still in flight
    assert_eq!(h.worker.process_due_jobs().await.unwrap(), 1);
    assert_eq!(h.queue.release_delays(), vec![Duration::from_secs(5)]);
    assert_eq!(h.queue.pending().len(), 1);
    assert_eq!(h.storage.keys(), vec!["chats/1/photo.jpg".to_string()]);

    h.records.set_status(1, ThreadStatus::Closed);
    drain(&h).await;

    assert!(h.queue.failed().is_empty());
    assert!(h.storage.keys().is_empty());
    assert!(h.records.messages(1).iter().all(|m| m.is_redacted()));
}

#[tokio::test(start_paused = true)]
async fn test_close_that_never_commits_ends_in_failed_store() {
    let h = harness();
    h.records.set_status(1, ThreadStatus::Open);
    dispatch(&h).await;

    drain(&h).await;

    let failed = h.queue.failed();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.contains("still open"));
    assert_eq!(h.storage.delete_calls(), 0);
    assert_eq!(h.storage.keys(), vec!["chats/1/photo.jpg".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_run_job_reports_each_outcome() {
    let h = harness();
    h.storage.fail_next(1);
    dispatch(&h).await;

    let job = h.queue.pending().remove(0);
    let first = h.worker.run_job(job.clone()).await.unwrap();
    assert_eq!(first, JobResult::Retrying { attempts: 1, delay: Duration::from_secs(5) });

    let second = h.worker.run_job(job.with_failed_attempt()).await.unwrap();
    assert_eq!(second, JobResult::Completed);
    assert!(h.queue.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_thread_completes_without_retry() {
    let h = harness();
    let dispatcher = JobDispatcher::new(Arc::clone(&h.queue) as _);
    dispatcher.dispatch(JobPayload::CloseChatAndPurgeMedia { thread_id: 999 }).await.unwrap();

    drain(&h).await;

    assert!(h.queue.release_delays().is_empty());
    assert!(h.queue.failed().is_empty());
    assert_eq!(h.storage.keys(), vec!["chats/1/photo.jpg".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_worker_loop_stops_on_shutdown() {
    let h = harness();
    dispatch(&h).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let queue = Arc::clone(&h.queue);
    let handle = tokio::spawn(h.worker.run(shutdown_rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(queue.pending().is_empty());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
}
