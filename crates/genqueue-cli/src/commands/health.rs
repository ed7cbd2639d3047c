//! Queue history summary command.

use chrono::Utc;
use clap::Args;
use serde::Serialize;

use genqueue_core::config::queue::hours_before;
use genqueue_core::error::AppError;
use genqueue_database::{JobFilter, JobStore};
use genqueue_entity::job::JobStatus;
use genqueue_entity::report::QueueHealth;

use crate::output::{self, OutputFormat};

/// Arguments for the health command
#[derive(Debug, Args)]
pub struct HealthArgs {
    /// History window in hours; defaults to the configured window
    #[arg(long)]
    pub hours: Option<i64>,
}

/// Persisted-history view of queue health.
///
/// Live figures such as active batches only exist inside a running
/// server and are left at zero here.
#[derive(Debug, Serialize)]
struct HealthSummary {
    window_hours: i64,
    #[serde(flatten)]
    health: QueueHealth,
}

/// Execute the health command
pub async fn execute(
    args: &HealthArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let window_hours = args.hours.unwrap_or(config.queue.history_window_hours);
    let now = Utc::now();
    let since = hours_before(now, window_hours)?;
    let window_start = config.queue.throughput_start(now)?;

    let db = super::connect(&config).await?;
    let jobs = db.job_repository();

    let mut health = QueueHealth::default();
    for (status, count) in jobs.status_counts(since).await? {
        health.record(status, count);
    }

    let completed = jobs
        .list_recent(&JobFilter::since(since).with_status(JobStatus::Completed))
        .await?;
    health.apply_history(&completed, window_start, config.queue.throughput_window_minutes);

    output::print_record(
        &HealthSummary {
            window_hours,
            health,
        },
        format,
    );

    db.close().await;
    Ok(())
}
