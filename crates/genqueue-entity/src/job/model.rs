//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use genqueue_core::types::id::{BatchId, JobId};

use super::params::GenerationParams;
use super::status::{JobStatus, PlanTier};

/// A single generation request tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Owning user.
    pub user_id: String,
    /// Target model identifier.
    pub model_id: String,
    /// Generation inputs.
    #[sqlx(json)]
    pub params: GenerationParams,
    /// Plan tier of the owner at submission time.
    pub plan_tier: PlanTier,
    /// Caller-supplied base priority.
    pub base_priority: i32,
    /// Effective priority in 1..=10, higher runs sooner.
    pub priority: i32,
    /// Retries already spent.
    pub retry_count: i32,
    /// Retries allowed.
    pub max_retries: i32,
    /// Current batch assignment.
    pub batch_id: Option<BatchId>,
    /// Current job status.
    pub status: JobStatus,
    /// Credits deducted at admission.
    pub credits_charged: i64,
    /// Result payload on completion.
    pub result: Option<serde_json::Value>,
    /// Error message on failure.
    pub error_message: Option<String>,
    /// Time spent in the executor for the final attempt.
    pub processing_time_ms: Option<i64>,
    /// When the job was admitted.
    pub created_at: DateTime<Utc>,
    /// When the current attempt was claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Expected completion of the current attempt.
    pub estimated_completion: Option<DateTime<Utc>>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh `pending` job from admission data.
    pub fn new(data: CreateJob) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: data.user_id,
            model_id: data.model_id,
            params: data.params,
            plan_tier: data.plan_tier,
            base_priority: data.base_priority,
            priority: data.priority,
            retry_count: 0,
            max_retries: data.max_retries,
            batch_id: None,
            status: JobStatus::Pending,
            credits_charged: data.credits_charged,
            result: None,
            error_message: None,
            processing_time_ms: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            estimated_completion: None,
            updated_at: now,
        }
    }

    /// Check if another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Record membership of an open batch.
    pub fn mark_batched(&mut self, batch_id: BatchId) {
        self.batch_id = Some(batch_id);
        self.status = JobStatus::Batched;
        self.updated_at = Utc::now();
    }

    /// Record that an executor claimed the job.
    pub fn mark_processing(&mut self, estimated_completion: Option<DateTime<Utc>>) {
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.estimated_completion = estimated_completion;
        self.updated_at = now;
    }

    /// Attach the result and finish the job.
    pub fn mark_completed(&mut self, result: serde_json::Value, processing_time_ms: i64) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error_message = None;
        self.processing_time_ms = Some(processing_time_ms);
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Fail the job permanently.
    pub fn mark_failed(&mut self, error_message: impl Into<String>, processing_time_ms: i64) {
        let now = Utc::now();
        let message = error_message.into();
        self.status = JobStatus::Failed;
        self.error_message = Some(if message.is_empty() {
            "generation failed".to_string()
        } else {
            message
        });
        self.processing_time_ms = Some(processing_time_ms);
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Cancel the job.
    pub fn mark_cancelled(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Cancelled;
        self.batch_id = None;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Spend one retry and return the job to `pending` with a new priority.
    ///
    /// Returns `false` and leaves the job untouched when no retries remain.
    pub fn reset_for_retry(&mut self, priority: i32, last_error: impl Into<String>) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.retry_count += 1;
        self.priority = priority;
        self.status = JobStatus::Pending;
        self.batch_id = None;
        self.started_at = None;
        self.estimated_completion = None;
        self.error_message = Some(last_error.into());
        self.updated_at = Utc::now();
        true
    }
}

/// Data required to admit a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Owning user.
    pub user_id: String,
    /// Target model.
    pub model_id: String,
    /// Validated generation inputs.
    pub params: GenerationParams,
    /// Plan tier.
    pub plan_tier: PlanTier,
    /// Caller-supplied base priority.
    pub base_priority: i32,
    /// Computed priority.
    pub priority: i32,
    /// Retries allowed.
    pub max_retries: i32,
    /// Credits already deducted.
    pub credits_charged: i64,
}
