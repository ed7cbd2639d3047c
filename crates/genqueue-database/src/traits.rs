//! Store and ledger traits consumed by the scheduler.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use genqueue_core::result::AppResult;
use genqueue_core::types::id::JobId;
use genqueue_entity::job::{Job, JobStatus};

/// Selection criteria for [`JobStore::list_recent`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Only jobs created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Only jobs owned by this user.
    pub user_id: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<i64>,
}

impl JobFilter {
    /// Jobs created since the given instant.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    /// Restrict to one status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to one owner.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Cap the result size.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a job satisfies every set criterion.
    pub fn matches(&self, job: &Job) -> bool {
        self.since.is_none_or(|since| job.created_at >= since)
            && self.status.is_none_or(|status| job.status == status)
            && self
                .user_id
                .as_deref()
                .is_none_or(|user_id| job.user_id == user_id)
    }
}

/// Durable job records. Source of truth for status queries.
///
/// Writes are last-writer-wins per job id.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace a job record.
    async fn upsert(&self, job: &Job) -> AppResult<()>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> AppResult<Option<Job>>;

    /// List jobs matching the filter, newest first.
    async fn list_recent(&self, filter: &JobFilter) -> AppResult<Vec<Job>>;

    /// Count jobs per status created since the given instant.
    async fn status_counts(&self, since: DateTime<Utc>) -> AppResult<HashMap<JobStatus, u64>> {
        let jobs = self.list_recent(&JobFilter::since(since)).await?;
        let mut counts = HashMap::new();
        for job in jobs {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// User credit balances.
#[async_trait]
pub trait CreditLedger: Send + Sync + std::fmt::Debug + 'static {
    /// Deduct `amount` if the balance covers it.
    ///
    /// Returns `Ok(false)` when the balance is insufficient; nothing is
    /// deducted in that case.
    async fn deduct(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<bool>;

    /// Give back credits for work that was never delivered.
    async fn refund(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<()>;

    /// Add credits and return the new balance.
    async fn grant(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<i64>;

    /// Current balance.
    async fn balance(&self, user_id: &str) -> AppResult<i64>;
}
