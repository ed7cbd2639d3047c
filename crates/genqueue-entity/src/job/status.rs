//! Job status and plan tier enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use genqueue_core::config::PlanWeights;

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "generation_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Admitted but not yet placed in a batch.
    Pending,
    /// Member of an open batch awaiting dispatch.
    Batched,
    /// Claimed by a batch executor.
    Processing,
    /// Finished with a result.
    Completed,
    /// Failed after exhausting retries or on a permanent error.
    Failed,
    /// Cancelled by its owner before dispatch.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job has not yet been claimed by an executor.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Batched)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Batched => "batched",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "batched" => Ok(Self::Batched),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Subscription plan of the submitting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Entry plan.
    Basic,
    /// Mid plan.
    Professional,
    /// Top plan.
    Executive,
}

impl PlanTier {
    /// Priority weight configured for this tier.
    pub fn weight(&self, weights: &PlanWeights) -> i32 {
        match self {
            Self::Basic => weights.basic,
            Self::Professional => weights.professional,
            Self::Executive => weights.executive,
        }
    }

    /// Return the tier as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Executive => "executive",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "professional" => Ok(Self::Professional),
            "executive" => Ok(Self::Executive),
            other => Err(format!("unknown plan tier '{other}'")),
        }
    }
}
