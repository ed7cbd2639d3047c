//! Integration tests for queue health reporting.

use std::time::Duration;

use genqueue_core::error::ErrorKind;

use crate::helpers::{ScriptedBackend, TestQueue, test_config};

#[tokio::test(start_paused = true)]
async fn test_empty_queue_health() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let health = queue.orchestrator.queue_health().await.unwrap();
    assert_eq!(health.total_jobs, 0);
    assert_eq!(health.pending_jobs, 0);
    assert_eq!(health.active_batch_count, 0);
    assert_eq!(health.throughput_per_minute, 0.0);
    assert_eq!(health.estimated_wait_seconds, 0);
    assert!(!health.backpressure);
}

#[tokio::test(start_paused = true)]
async fn test_health_after_completions() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let mut done = Vec::new();
    for i in 0..3 {
        let request = TestQueue::request("alice", &format!("finished {i}"));
        done.push(queue.orchestrator.submit(request).await.unwrap());
    }
    // Fill the batch with distinct prompts so it dispatches now.
    for i in 0..2 {
        let request = TestQueue::request("bob", &format!("finished {i}"));
        done.push(queue.orchestrator.submit(request).await.unwrap());
    }
    for response in &done {
        queue
            .wait_terminal(response.job_id, Duration::from_secs(120))
            .await;
    }

    let waiting = queue
        .orchestrator
        .submit(TestQueue::request("carol", "still waiting"))
        .await
        .unwrap();

    let health = queue.orchestrator.queue_health().await.unwrap();
    assert_eq!(health.total_jobs, 6);
    assert_eq!(health.completed_jobs, 5);
    assert_eq!(health.failed_jobs, 0);
    assert_eq!(health.pending_jobs, 1);
    assert_eq!(health.processing_jobs, 0);
    assert_eq!(health.active_batch_count, 1);
    assert!(health.throughput_per_minute > 0.0);
    assert!(health.avg_processing_time_seconds >= 1.0);
    assert!(health.avg_processing_time_seconds < 5.0);
    assert!(health.estimated_wait_seconds > 0);
    assert!(!health.backpressure);

    let report = queue.orchestrator.get_status(waiting.job_id).await.unwrap();
    assert_eq!(report.progress, 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_backpressure_flag_over_ceiling() {
    let mut config = test_config();
    config.queue.max_live_jobs = 2;
    let queue = TestQueue::with_config(config, ScriptedBackend::succeeding());

    for i in 0..2 {
        let request = TestQueue::request("dave", &format!("load {i}"));
        queue.orchestrator.submit(request).await.unwrap();
    }
    assert!(!queue.orchestrator.queue_health().await.unwrap().backpressure);

    queue
        .orchestrator
        .submit(TestQueue::request("dave", "load 2"))
        .await
        .unwrap();
    let health = queue.orchestrator.queue_health().await.unwrap();
    assert!(health.backpressure);
    assert_eq!(health.pending_jobs, 3);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_windows_are_reported_not_panicked() {
    let mut config = test_config();
    config.queue.history_window_hours = 10_000_000_000;
    assert!(config.validate().is_err());
    let queue = TestQueue::with_config(config, ScriptedBackend::succeeding());
    let err = queue.orchestrator.queue_health().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let mut config = test_config();
    config.queue.throughput_window_minutes = -5;
    assert!(config.validate().is_err());
    let queue = TestQueue::with_config(config, ScriptedBackend::succeeding());
    let err = queue.orchestrator.queue_health().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
