//! Integration tests for retry and failure handling.

use std::sync::atomic::Ordering;
use std::time::Duration;

use genqueue_entity::job::JobStatus;
use genqueue_scheduler::GenerationError;

use crate::helpers::{ScriptedBackend, TestQueue, test_config};

const LIMIT: Duration = Duration::from_secs(600);

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_until_success() {
    let queue = TestQueue::new(ScriptedBackend::failing_then_ok(3));

    let response = queue
        .orchestrator
        .submit(TestQueue::request("alice", "stubborn"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 3);
    assert!(job.result.is_some());
    assert_eq!(queue.backend.calls(), 4);
    assert_eq!(queue.balance("alice").await, 99);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_and_refund() {
    let mut config = test_config();
    config.queue.max_retries = 2;
    let queue = TestQueue::with_config(
        config,
        ScriptedBackend::always_failing(GenerationError::Transient(
            "backend returned 503".to_string(),
        )),
    );

    let response = queue
        .orchestrator
        .submit(TestQueue::request("bob", "never works"))
        .await
        .unwrap();
    assert_eq!(queue.balance("bob").await, 99);

    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 2);
    assert!(job.retry_count <= job.max_retries);
    assert!(job.error_message.as_deref().is_some_and(|m| !m.is_empty()));
    assert!(job.result.is_none());
    assert_eq!(queue.backend.calls(), 3);
    assert_eq!(queue.balance("bob").await, 100);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_skips_retries() {
    let queue = TestQueue::new(ScriptedBackend::always_failing(GenerationError::Permanent(
        "backend returned 400: prompt rejected".to_string(),
    )));

    let response = queue
        .orchestrator
        .submit(TestQueue::request("carol", "forbidden"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);
    assert!(job.error_message.unwrap_or_default().contains("prompt rejected"));
    assert_eq!(queue.backend.calls(), 1);
    assert_eq!(queue.balance("carol").await, 100);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out_and_retries() {
    let mut config = test_config();
    config.generation.timeout_seconds = 5;
    config.queue.max_retries = 1;
    let queue = TestQueue::with_config(
        config,
        ScriptedBackend::succeeding().with_delay(Duration::from_secs(30)),
    );

    let response = queue
        .orchestrator
        .submit(TestQueue::request("dave", "glacial"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 1);
    assert!(job.error_message.unwrap_or_default().contains("timed out"));
    assert_eq!(queue.backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retried_job_stays_live_while_its_record_is_written() {
    let queue = TestQueue::new(ScriptedBackend::failing_then_ok(1));

    let response = queue
        .orchestrator
        .submit(TestQueue::request("erin", "second try"))
        .await
        .unwrap();
    queue.store.write_delay_ms.store(5_000, Ordering::SeqCst);

    // Timeout dispatch at 30s, claim write until 35s, failed call until 36s,
    // then the retry record is written until 41s.
    tokio::time::sleep(Duration::from_secs(38)).await;
    assert_eq!(queue.backend.calls(), 1);

    let job = queue.job(response.job_id).await;
    assert_eq!(job.status, JobStatus::Batched);
    assert_eq!(job.retry_count, 1);
    assert!(queue.orchestrator.cancel(response.job_id, "erin").await.unwrap());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(queue.job(response.job_id).await.status, JobStatus::Cancelled);
    assert_eq!(queue.backend.calls(), 1);
    assert_eq!(queue.balance("erin").await, 100);
}
