//! Integration tests for cancellation.

use std::time::Duration;

use genqueue_core::types::id::JobId;
use genqueue_entity::job::JobStatus;
use genqueue_scheduler::GenerationError;

use crate::helpers::{ScriptedBackend, TestQueue};

#[tokio::test(start_paused = true)]
async fn test_cancel_before_dispatch() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let response = queue
        .orchestrator
        .submit(TestQueue::request("alice", "changed my mind"))
        .await
        .unwrap();
    assert_eq!(queue.balance("alice").await, 99);

    assert!(queue.orchestrator.cancel(response.job_id, "alice").await.unwrap());
    assert_eq!(queue.orchestrator.active_batch_count(), 0);
    assert_eq!(queue.balance("alice").await, 100);

    // Let the batch timeout pass; nothing may run.
    tokio::time::sleep(queue.config.queue.batch_timeout() * 2).await;
    assert_eq!(queue.backend.calls(), 0);

    let job = queue.job(response.job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.batch_id.is_none());

    // Cancelling again is a no-op that still reports success.
    assert!(queue.orchestrator.cancel(response.job_id, "alice").await.unwrap());
    assert_eq!(queue.balance("alice").await, 100);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_leaves_batch_mates_alone() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let keep = queue
        .orchestrator
        .submit(TestQueue::request("bob", "keep me"))
        .await
        .unwrap();
    let dropped = queue
        .orchestrator
        .submit(TestQueue::request("bob", "drop me"))
        .await
        .unwrap();
    assert_eq!(keep.batch_id, dropped.batch_id);

    assert!(queue.orchestrator.cancel(dropped.job_id, "bob").await.unwrap());
    assert_eq!(queue.orchestrator.active_batch_count(), 1);

    let kept = queue.wait_terminal(keep.job_id, Duration::from_secs(120)).await;
    assert_eq!(kept.status, JobStatus::Completed);
    assert_eq!(queue.backend.calls(), 1);
    assert_eq!(queue.job(dropped.job_id).await.status, JobStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_refused_for_other_users_and_unknown_jobs() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let response = queue
        .orchestrator
        .submit(TestQueue::request("carol", "mine"))
        .await
        .unwrap();

    assert!(!queue.orchestrator.cancel(response.job_id, "mallory").await.unwrap());
    assert!(!queue.orchestrator.cancel(JobId::new(), "carol").await.unwrap());
    assert_eq!(queue.job(response.job_id).await.status, JobStatus::Batched);
    assert_eq!(queue.balance("carol").await, 99);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_refused_once_claimed() {
    let queue = TestQueue::new(ScriptedBackend::succeeding().with_delay(Duration::from_secs(10)));

    let mut responses = Vec::new();
    for i in 0..5 {
        let request = TestQueue::request("dave", &format!("busy {i}"));
        responses.push(queue.orchestrator.submit(request).await.unwrap());
    }
    let first = responses[0].job_id;
    assert_eq!(queue.job(first).await.status, JobStatus::Processing);
    assert!(!queue.orchestrator.cancel(first, "dave").await.unwrap());

    let job = queue.wait_terminal(first, Duration::from_secs(120)).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(!queue.orchestrator.cancel(first, "dave").await.unwrap());
    assert_eq!(queue.balance("dave").await, 95);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_refused_after_failure() {
    let queue = TestQueue::new(ScriptedBackend::always_failing(GenerationError::Permanent(
        "backend returned 422: unsupported size".to_string(),
    )));

    let response = queue
        .orchestrator
        .submit(TestQueue::request("frank", "too big"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, Duration::from_secs(120)).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(queue.balance("frank").await, 100);

    assert!(!queue.orchestrator.cancel(response.job_id, "frank").await.unwrap());
    let job = queue.job(response.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap_or_default().contains("unsupported size"));
    assert_eq!(queue.balance("frank").await, 100);
}
