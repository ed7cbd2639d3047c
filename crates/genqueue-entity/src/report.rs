//! Read models returned by status and health queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use genqueue_core::types::id::JobId;

use crate::job::{Job, JobStatus};

/// Caller-facing view of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    /// Job identifier.
    pub job_id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Progress in percent, 0..=100.
    pub progress: f64,
    /// Human-readable description of the current state.
    pub message: String,
    /// Estimated seconds until completion, when known.
    pub eta_seconds: Option<i64>,
}

/// Snapshot of queue load and recent throughput.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueHealth {
    /// Jobs created within the history window.
    pub total_jobs: u64,
    /// Jobs waiting for dispatch (`pending` or `batched`).
    pub pending_jobs: u64,
    /// Jobs currently executing.
    pub processing_jobs: u64,
    /// Jobs completed within the history window.
    pub completed_jobs: u64,
    /// Jobs failed within the history window.
    pub failed_jobs: u64,
    /// Batches currently held in memory.
    pub active_batch_count: u64,
    /// Completions per minute over the throughput window.
    pub throughput_per_minute: f64,
    /// Mean processing time of jobs completed in the throughput window.
    pub avg_processing_time_seconds: f64,
    /// Rough wait for a newly submitted job.
    pub estimated_wait_seconds: u64,
    /// Whether advisory resource ceilings are exceeded.
    pub backpressure: bool,
}

impl QueueHealth {
    /// Add `count` jobs of one status into the matching bucket.
    pub fn record(&mut self, status: JobStatus, count: u64) {
        self.total_jobs += count;
        match status {
            JobStatus::Pending | JobStatus::Batched => self.pending_jobs += count,
            JobStatus::Processing => self.processing_jobs += count,
            JobStatus::Completed => self.completed_jobs += count,
            JobStatus::Failed => self.failed_jobs += count,
            JobStatus::Cancelled => {}
        }
    }

    /// Fill throughput and mean processing time from completed jobs.
    ///
    /// Only jobs completed at or after `window_start` count. Jobs without
    /// a recorded processing time count toward throughput but not toward
    /// the mean.
    pub fn apply_history(&mut self, completed: &[Job], window_start: DateTime<Utc>, window_minutes: i64) {
        let finished: Vec<&Job> = completed
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .filter(|job| job.completed_at.is_some_and(|at| at >= window_start))
            .collect();

        self.throughput_per_minute = finished.len() as f64 / window_minutes.max(1) as f64;

        let durations: Vec<i64> = finished
            .iter()
            .filter_map(|job| job.processing_time_ms)
            .collect();
        self.avg_processing_time_seconds = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<i64>() as f64 / durations.len() as f64 / 1000.0
        };
    }
}
