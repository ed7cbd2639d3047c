//! Integration tests for result reuse.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use genqueue_entity::job::JobStatus;

use crate::helpers::{BrokenCache, ScriptedBackend, TestQueue};

const LIMIT: Duration = Duration::from_secs(600);

#[tokio::test(start_paused = true)]
async fn test_identical_jobs_generate_once() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let first = queue
        .orchestrator
        .submit(TestQueue::request("alice", "a quiet harbor"))
        .await
        .unwrap();
    let second = queue
        .orchestrator
        .submit(TestQueue::request("alice", "a   quiet harbor "))
        .await
        .unwrap();
    assert_eq!(first.batch_id, second.batch_id);

    let a = queue.wait_terminal(first.job_id, LIMIT).await;
    let b = queue.wait_terminal(second.job_id, LIMIT).await;

    assert_eq!(a.status, JobStatus::Completed);
    assert_eq!(b.status, JobStatus::Completed);
    assert_eq!(a.result, b.result);
    assert_eq!(queue.backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_is_served_from_cache() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let first = queue
        .orchestrator
        .submit(TestQueue::request("bob", "a paper crane"))
        .await
        .unwrap();
    let original = queue.wait_terminal(first.job_id, LIMIT).await;

    let again = queue
        .orchestrator
        .submit(TestQueue::request("bob", "a paper crane"))
        .await
        .unwrap();
    let repeat = queue.wait_terminal(again.job_id, LIMIT).await;

    assert_eq!(repeat.status, JobStatus::Completed);
    assert_eq!(repeat.result, original.result);
    assert_eq!(queue.backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fingerprint_is_scoped_to_user() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let a = queue
        .orchestrator
        .submit(TestQueue::request("carol", "a glass forest"))
        .await
        .unwrap();
    let b = queue
        .orchestrator
        .submit(TestQueue::request("dave", "a glass forest"))
        .await
        .unwrap();

    queue.wait_terminal(a.job_id, LIMIT).await;
    queue.wait_terminal(b.job_id, LIMIT).await;
    assert_eq!(queue.backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_read_failure_is_retried_then_fails() {
    let cache = Arc::new(BrokenCache::default());
    cache.fail_reads.store(true, Ordering::SeqCst);
    let queue = TestQueue::with_cache(ScriptedBackend::succeeding(), cache);

    let response = queue
        .orchestrator
        .submit(TestQueue::request("erin", "unlucky"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, queue.config.queue.max_retries as i32);
    assert_eq!(queue.backend.calls(), 0);
    assert_eq!(queue.balance("erin").await, 100);
}

#[tokio::test(start_paused = true)]
async fn test_cache_write_failure_still_completes() {
    let cache = Arc::new(BrokenCache::default());
    cache.fail_writes.store(true, Ordering::SeqCst);
    let queue = TestQueue::with_cache(ScriptedBackend::succeeding(), cache);

    let response = queue
        .orchestrator
        .submit(TestQueue::request("frank", "write-only"))
        .await
        .unwrap();
    let job = queue.wait_terminal(response.job_id, LIMIT).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.result.is_some());
    assert_eq!(queue.backend.calls(), 1);
}
