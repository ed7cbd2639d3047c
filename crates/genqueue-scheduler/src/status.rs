//! Caller-facing status reports.

use chrono::{DateTime, Utc};

use genqueue_entity::job::{Job, JobStatus};
use genqueue_entity::report::JobStatusReport;

const BATCHED_PROGRESS: f64 = 10.0;
const PROCESSING_CEILING: f64 = 90.0;

/// Build the status report for a job as of `now`.
///
/// Progress for a processing job grows with elapsed time against its
/// estimated duration and never exceeds 90 until the job finishes.
pub fn report(job: &Job, now: DateTime<Utc>) -> JobStatusReport {
    let (progress, message) = match job.status {
        JobStatus::Pending if job.retry_count > 0 => (
            0.0,
            format!(
                "Waiting to retry (attempt {} of {})",
                job.retry_count + 1,
                job.max_retries + 1
            ),
        ),
        JobStatus::Pending => (0.0, "Waiting for a batch".to_string()),
        JobStatus::Batched => (BATCHED_PROGRESS, "Queued in a batch".to_string()),
        JobStatus::Processing => (processing_progress(job, now), "Generating".to_string()),
        JobStatus::Completed => (100.0, "Completed".to_string()),
        JobStatus::Failed => (
            0.0,
            job.error_message
                .clone()
                .unwrap_or_else(|| "Failed".to_string()),
        ),
        JobStatus::Cancelled => (0.0, "Cancelled".to_string()),
    };

    let eta_seconds = match job.status {
        JobStatus::Processing => job
            .estimated_completion
            .map(|eta| (eta - now).num_seconds().max(0)),
        _ => None,
    };

    JobStatusReport {
        job_id: job.id,
        status: job.status,
        progress,
        message,
        eta_seconds,
    }
}

fn processing_progress(job: &Job, now: DateTime<Utc>) -> f64 {
    let (Some(started), Some(eta)) = (job.started_at, job.estimated_completion) else {
        return BATCHED_PROGRESS;
    };
    let total = (eta - started).num_milliseconds();
    if total <= 0 {
        return PROCESSING_CEILING;
    }
    let elapsed = (now - started).num_milliseconds().max(0);
    let fraction = elapsed as f64 / total as f64;
    (BATCHED_PROGRESS + fraction * (PROCESSING_CEILING - BATCHED_PROGRESS))
        .clamp(BATCHED_PROGRESS, PROCESSING_CEILING)
}
