//! Integration tests for batch assembly and dispatch triggers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use genqueue_core::types::id::BatchId;
use genqueue_entity::job::JobStatus;
use genqueue_scheduler::QueueSweeper;

use crate::helpers::{ScriptedBackend, TestQueue};

#[tokio::test(start_paused = true)]
async fn test_full_batch_dispatches_without_timeout() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());
    let started = Instant::now();

    let mut responses = Vec::new();
    for i in 0..5 {
        let request = TestQueue::request("alice", &format!("harbor {i}"));
        responses.push(queue.orchestrator.submit(request).await.unwrap());
    }

    let batch_id = responses[0].batch_id;
    assert!(responses.iter().all(|r| r.batch_id == batch_id));

    for response in &responses {
        let job = queue
            .wait_terminal(response.job_id, Duration::from_secs(120))
            .await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert_eq!(job.retry_count, 0);
    }

    assert!(started.elapsed() < queue.config.queue.batch_timeout());
    assert_eq!(queue.backend.calls(), 5);
    assert!(queue.orchestrator.wait_idle(Duration::from_secs(5)).await);
    assert_eq!(queue.orchestrator.active_batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_partial_batch_dispatches_after_timeout() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());
    let started = Instant::now();

    let response = queue
        .orchestrator
        .submit(TestQueue::request("bob", "lonely job"))
        .await
        .unwrap();

    tokio::time::sleep(queue.config.queue.batch_timeout() - Duration::from_secs(1)).await;
    assert_eq!(queue.job(response.job_id).await.status, JobStatus::Batched);
    assert_eq!(queue.backend.calls(), 0);

    let job = queue
        .wait_terminal(response.job_id, Duration::from_secs(120))
        .await;
    assert_eq!(job.status, JobStatus::Completed);

    assert!(job.started_at.is_some());
    let limit = queue.config.queue.batch_timeout()
        + queue.config.queue.sweep_interval()
        + Duration::from_secs(2);
    assert!(started.elapsed() <= limit);
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_homogeneous_and_bounded() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let mut members: HashMap<BatchId, Vec<String>> = HashMap::new();
    for i in 0..13 {
        let mut request = TestQueue::request("carol", &format!("scene {i}"));
        request.model_id = if i % 3 == 0 { "flux-dev" } else { "sdxl" }.to_string();
        let model_id = request.model_id.clone();
        let response = queue.orchestrator.submit(request).await.unwrap();
        members.entry(response.batch_id).or_default().push(model_id);
    }

    for models in members.values() {
        assert!(models.len() <= queue.config.queue.max_batch_size);
        assert!(models.iter().all(|m| m == &models[0]));
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_is_idempotent() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let response = queue
        .orchestrator
        .submit(TestQueue::request("dave", "only once"))
        .await
        .unwrap();

    assert!(queue.orchestrator.dispatch(response.batch_id));
    assert!(!queue.orchestrator.dispatch(response.batch_id));
    assert_eq!(queue.orchestrator.sweep(), 0);

    queue
        .wait_terminal(response.job_id, Duration::from_secs(60))
        .await;
    tokio::time::sleep(queue.config.queue.batch_timeout()).await;

    assert!(!queue.orchestrator.dispatch(response.batch_id));
    assert_eq!(queue.backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_dispatches_expired_batches() {
    let mut config = crate::helpers::test_config();
    config.queue.batch_timeout_seconds = 10;
    let queue = TestQueue::with_config(config, ScriptedBackend::succeeding());

    let response = queue
        .orchestrator
        .submit(TestQueue::request("erin", "swept"))
        .await
        .unwrap();
    assert_eq!(queue.orchestrator.sweep(), 0);

    tokio::time::advance(Duration::from_secs(10)).await;
    let swept = queue.orchestrator.sweep();
    let job = queue
        .wait_terminal(response.job_id, Duration::from_secs(30))
        .await;

    assert!(swept <= 1);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(queue.backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_stops_on_shutdown() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());
    let (tx, rx) = watch::channel(false);

    let sweeper = QueueSweeper::new(queue.orchestrator.clone());
    let handle = tokio::spawn(async move { sweeper.run(rx).await });

    let response = queue
        .orchestrator
        .submit(TestQueue::request("frank", "sweeper"))
        .await
        .unwrap();
    queue
        .wait_terminal(response.job_id, Duration::from_secs(60))
        .await;

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper stopped")
        .unwrap();
    assert!(queue.orchestrator.wait_idle(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_does_not_stall_batches() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    for i in 0..5 {
        let request = TestQueue::request("grace", &format!("outage {i}"));
        queue.orchestrator.submit(request).await.unwrap();
    }
    queue
        .store
        .fail_writes
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(queue.orchestrator.wait_idle(Duration::from_secs(60)).await);
    assert_eq!(queue.orchestrator.active_batch_count(), 0);
    assert_eq!(queue.backend.calls(), 5);
}
