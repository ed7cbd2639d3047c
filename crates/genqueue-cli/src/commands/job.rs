//! Job record lookup and maintenance commands.

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use genqueue_core::config::queue::hours_before;
use genqueue_core::error::AppError;
use genqueue_core::types::id::JobId;
use genqueue_database::{JobFilter, JobStore};
use genqueue_entity::job::{Job, JobStatus};
use genqueue_scheduler::status;

use crate::output::{self, OutputFormat};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Show one job with its progress
    Show {
        /// Job ID
        id: String,
    },
    /// List recent jobs
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by owning user
        #[arg(short, long)]
        user: Option<String>,
        /// Only jobs created in the last N hours
        #[arg(long, default_value = "24")]
        hours: i64,
        /// Maximum number of rows
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Delete finished jobs older than N days
    Cleanup {
        /// Age threshold in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

/// Job display row for table output
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    id: String,
    user: String,
    model: String,
    status: String,
    priority: i32,
    retries: String,
    credits: i64,
    created_at: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            user: job.user_id.clone(),
            model: job.model_id.clone(),
            status: job.status.to_string(),
            priority: job.priority,
            retries: format!("{}/{}", job.retry_count, job.max_retries),
            credits: job.credits_charged,
            created_at: job.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Execute job commands
pub async fn execute(
    args: &JobArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let db = super::connect(&config).await?;
    let jobs = db.job_repository();

    match &args.command {
        JobCommand::Show { id } => {
            let job_id: JobId = id
                .parse()
                .map_err(|e| AppError::validation(format!("Invalid job id '{id}': {e}")))?;
            let job = jobs
                .get(job_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;

            output::print_record(&status::report(&job, Utc::now()), format);
            if format == OutputFormat::Table {
                output::print_kv("user", &job.user_id);
                output::print_kv("model", &job.model_id);
                output::print_kv("priority", &job.priority.to_string());
                output::print_kv(
                    "retries",
                    &format!("{}/{}", job.retry_count, job.max_retries),
                );
                if let Some(error) = &job.error_message {
                    output::print_kv("last error", error);
                }
            }
        }
        JobCommand::List {
            status,
            user,
            hours,
            limit,
        } => {
            let mut filter = JobFilter::since(hours_before(Utc::now(), *hours)?).with_limit(*limit);
            if let Some(status) = status {
                let status: JobStatus = status.parse().map_err(AppError::validation)?;
                filter = filter.with_status(status);
            }
            if let Some(user) = user {
                filter = filter.with_user(user.clone());
            }

            let rows: Vec<JobRow> = jobs
                .list_recent(&filter)
                .await?
                .iter()
                .map(JobRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        JobCommand::Cleanup { days } => {
            let before = hours_before(Utc::now(), days.saturating_mul(24))?;
            let removed = jobs.cleanup_old(before).await?;
            output::print_success(&format!(
                "Removed {removed} finished job(s) older than {days} day(s)"
            ));
        }
    }

    db.close().await;
    Ok(())
}
