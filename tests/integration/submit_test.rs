//! Integration tests for admission.

use std::time::Duration;

use serde_json::json;

use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::types::id::JobId;
use genqueue_database::JobStore;
use genqueue_entity::job::{JobStatus, PlanTier};
use genqueue_scheduler::{SubmitError, SubmitRequest};

use crate::helpers::{ScriptedBackend, TestQueue};

#[tokio::test(start_paused = true)]
async fn test_submit_charges_credits_and_batches_job() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let mut request = TestQueue::request("alice", "a lighthouse at dusk");
    request.model_id = "flux-dev".to_string();
    request.params = json!({"prompt": "a lighthouse at dusk", "num_outputs": 3});

    let response = queue.orchestrator.submit(request).await.expect("admitted");
    let job = queue.job(response.job_id).await;

    assert_eq!(job.status, JobStatus::Batched);
    assert_eq!(job.batch_id, Some(response.batch_id));
    assert_eq!(job.credits_charged, 6);
    assert_eq!(queue.balance("alice").await, 94);

    let stored = queue.store.inner.get(response.job_id).await.unwrap();
    assert_eq!(stored.map(|j| j.status), Some(JobStatus::Batched));
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_credits_creates_no_job() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());
    queue.credits.set_balance("bob", 1);

    let mut request = TestQueue::request("bob", "a red fox");
    request.params = json!({"prompt": "a red fox", "num_outputs": 2});

    let err = queue.orchestrator.submit(request).await.unwrap_err();
    assert!(matches!(err, SubmitError::InsufficientCredits { required: 2 }));
    assert!(queue.store.inner.is_empty());
    assert_eq!(queue.balance("bob").await, 1);
    assert_eq!(queue.orchestrator.active_batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_admission_errors_never_charge() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let mut unknown = TestQueue::request("carol", "a cat");
    unknown.model_id = "dall-e-9".to_string();
    assert!(matches!(
        queue.orchestrator.submit(unknown).await,
        Err(SubmitError::UnknownModel(_))
    ));

    let mut malformed = TestQueue::request("carol", "a cat");
    malformed.params = json!(["not", "an", "object"]);
    assert!(matches!(
        queue.orchestrator.submit(malformed).await,
        Err(SubmitError::InvalidParams(_))
    ));

    let mut too_many = TestQueue::request("carol", "a cat");
    too_many.params = json!({"prompt": "a cat", "num_outputs": 50});
    assert!(matches!(
        queue.orchestrator.submit(too_many).await,
        Err(SubmitError::InvalidParams(_))
    ));

    let mut bad_priority = TestQueue::request("carol", "a cat");
    bad_priority.base_priority = Some(11);
    let err = queue.orchestrator.submit(bad_priority).await.unwrap_err();
    assert_eq!(AppError::from(err).kind, ErrorKind::Validation);

    assert_eq!(queue.balance("carol").await, 100);
    assert!(queue.store.inner.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_higher_tier_gets_higher_priority() {
    let queue = TestQueue::new(ScriptedBackend::succeeding());

    let basic = queue
        .orchestrator
        .submit(TestQueue::request("dave", "a tree"))
        .await
        .unwrap();
    let executive = queue
        .orchestrator
        .submit(SubmitRequest {
            plan_tier: PlanTier::Executive,
            ..TestQueue::request("erin", "a tree")
        })
        .await
        .unwrap();

    let basic = queue.job(basic.job_id).await;
    let executive = queue.job(executive.job_id).await;
    assert!(executive.priority > basic.priority);
    assert!((1..=10).contains(&executive.priority));
}

#[tokio::test(start_paused = true)]
async fn test_status_reports() {
    let queue = TestQueue::new(ScriptedBackend::succeeding().with_delay(Duration::from_secs(10)));

    let err = queue.orchestrator.get_status(JobId::new()).await.unwrap_err();
    assert!(err.is_not_found());

    let submitted = queue
        .orchestrator
        .submit(TestQueue::request("frank", "a bridge"))
        .await
        .unwrap();
    let report = queue.orchestrator.get_status(submitted.job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Batched);
    assert_eq!(report.progress, 10.0);
    assert!(report.eta_seconds.is_none());

    assert!(queue.orchestrator.dispatch(submitted.batch_id));
    tokio::task::yield_now().await;
    let report = queue.orchestrator.get_status(submitted.job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Processing);
    assert!(report.progress >= 10.0 && report.progress <= 90.0);
    assert!(report.eta_seconds.is_some());

    queue
        .wait_terminal(submitted.job_id, Duration::from_secs(60))
        .await;
    let report = queue.orchestrator.get_status(submitted.job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.progress, 100.0);
}
