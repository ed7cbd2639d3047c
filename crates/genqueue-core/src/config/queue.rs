//! Batching and execution configuration.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest accepted history window: one year.
pub const MAX_HISTORY_WINDOW_HOURS: i64 = 24 * 365;
/// Longest accepted throughput window: one week.
pub const MAX_THROUGHPUT_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Process-wide queue tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of jobs in one batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Age in seconds after which an unfilled batch is force-dispatched.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_seconds: u64,
    /// Number of jobs of one batch that may run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Interval in seconds between background sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Retries allowed per job before it fails permanently.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base priority applied when a submission does not carry one.
    #[serde(default = "default_base_priority")]
    pub default_base_priority: u8,
    /// Maximum priority distance between a job and the batch it joins.
    #[serde(default = "default_priority_tolerance")]
    pub priority_tolerance: u8,
    /// Lookback window in hours for queue health counts.
    #[serde(default = "default_history_window")]
    pub history_window_hours: i64,
    /// Lookback window in minutes for throughput figures.
    #[serde(default = "default_throughput_window")]
    pub throughput_window_minutes: i64,
    /// Advisory ceiling on jobs held in memory. Exceeding it only raises
    /// the back-pressure signal.
    #[serde(default = "default_max_live_jobs")]
    pub max_live_jobs: usize,
    /// Advisory ceiling on live batches.
    #[serde(default = "default_max_active_batches")]
    pub max_active_batches: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_timeout_seconds: default_batch_timeout(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            sweep_interval_seconds: default_sweep_interval(),
            max_retries: default_max_retries(),
            default_base_priority: default_base_priority(),
            priority_tolerance: default_priority_tolerance(),
            history_window_hours: default_history_window(),
            throughput_window_minutes: default_throughput_window(),
            max_live_jobs: default_max_live_jobs(),
            max_active_batches: default_max_active_batches(),
        }
    }
}

impl QueueConfig {
    /// Batch timeout as a [`Duration`].
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_seconds)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Reject values that would stall or break the scheduler.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_batch_size == 0 {
            return Err(AppError::configuration(
                "queue.max_batch_size must be greater than zero",
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(AppError::configuration(
                "queue.max_concurrent_jobs must be greater than zero",
            ));
        }
        if self.batch_timeout_seconds == 0 || self.sweep_interval_seconds == 0 {
            return Err(AppError::configuration(
                "queue.batch_timeout_seconds and queue.sweep_interval_seconds must be greater than zero",
            ));
        }
        if !(1..=10).contains(&self.default_base_priority) {
            return Err(AppError::configuration(
                "queue.default_base_priority must be within 1..=10",
            ));
        }
        if !(1..=MAX_HISTORY_WINDOW_HOURS).contains(&self.history_window_hours) {
            return Err(AppError::configuration(format!(
                "queue.history_window_hours must be within 1..={MAX_HISTORY_WINDOW_HOURS}"
            )));
        }
        if !(1..=MAX_THROUGHPUT_WINDOW_MINUTES).contains(&self.throughput_window_minutes) {
            return Err(AppError::configuration(format!(
                "queue.throughput_window_minutes must be within 1..={MAX_THROUGHPUT_WINDOW_MINUTES}"
            )));
        }
        Ok(())
    }

    /// Start of the history window ending at `now`.
    pub fn history_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        hours_before(now, self.history_window_hours)
    }

    /// Start of the throughput window ending at `now`.
    pub fn throughput_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        lookback(
            now,
            TimeDelta::try_minutes(self.throughput_window_minutes),
            "throughput window",
        )
    }
}

/// `now` minus `hours`; a validation error when the window is not positive
/// or reaches outside the representable range.
pub fn hours_before(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, AppError> {
    lookback(now, TimeDelta::try_hours(hours), "history window")
}

fn lookback(
    now: DateTime<Utc>,
    window: Option<TimeDelta>,
    what: &str,
) -> Result<DateTime<Utc>, AppError> {
    window
        .filter(|window| *window > TimeDelta::zero())
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| AppError::validation(format!("{what} is out of range")))
}

fn default_max_batch_size() -> usize {
    5
}

fn default_batch_timeout() -> u64 {
    30
}

fn default_max_concurrent_jobs() -> usize {
    3
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_priority() -> u8 {
    5
}

fn default_priority_tolerance() -> u8 {
    2
}

fn default_history_window() -> i64 {
    24
}

fn default_throughput_window() -> i64 {
    60
}

fn default_max_live_jobs() -> usize {
    1000
}

fn default_max_active_batches() -> usize {
    200
}
