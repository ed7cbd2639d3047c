//! In-memory batch of same-model jobs.

use std::fmt;

use tokio::time::Instant;

use genqueue_core::types::id::{BatchId, JobId};

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Open for new members, awaiting dispatch.
    Pending,
    /// Claimed by an executor.
    Processing,
    /// Finished with at least one completed member.
    Completed,
    /// Finished with every member failed.
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A group of jobs for one model dispatched together.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Batch identifier.
    pub id: BatchId,
    /// Model shared by every member.
    pub model_id: String,
    /// Members in arrival order.
    pub job_ids: Vec<JobId>,
    /// Current status.
    pub status: BatchStatus,
    /// Priority of the job that opened the batch.
    pub priority: i32,
    /// When the batch was opened.
    pub created_at: Instant,
    /// When the batch was dispatched.
    pub started_at: Option<Instant>,
    /// When execution finished.
    pub completed_at: Option<Instant>,
    /// Members that completed.
    pub completed_count: u32,
    /// Members that failed permanently.
    pub failed_count: u32,
    /// Members sent back for another attempt.
    pub retried_count: u32,
}

impl Batch {
    /// Open an empty batch.
    pub fn new(model_id: impl Into<String>, priority: i32) -> Self {
        Self {
            id: BatchId::new(),
            model_id: model_id.into(),
            job_ids: Vec::new(),
            status: BatchStatus::Pending,
            priority,
            created_at: Instant::now(),
            started_at: None,
            completed_at: None,
            completed_count: 0,
            failed_count: 0,
            retried_count: 0,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.job_ids.len()
    }

    /// Whether the batch has no members.
    pub fn is_empty(&self) -> bool {
        self.job_ids.is_empty()
    }

    /// Whether the batch has reached `max_size` members.
    pub fn is_full(&self, max_size: usize) -> bool {
        self.job_ids.len() >= max_size
    }

    /// Whether the batch has been open for at least `timeout`.
    pub fn is_expired(&self, timeout: std::time::Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= timeout
    }

    /// Remove a member, returning whether it was present.
    pub fn remove_job(&mut self, job_id: JobId) -> bool {
        let before = self.job_ids.len();
        self.job_ids.retain(|id| *id != job_id);
        self.job_ids.len() != before
    }

    /// Claim the batch for execution.
    ///
    /// Returns `false` if it was already claimed.
    pub fn start(&mut self) -> bool {
        if self.status != BatchStatus::Pending {
            return false;
        }
        self.status = BatchStatus::Processing;
        self.started_at = Some(Instant::now());
        true
    }

    /// Close the batch after execution.
    pub fn finish(&mut self) {
        self.status = if self.completed_count == 0 && self.failed_count > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        self.completed_at = Some(Instant::now());
    }
}
