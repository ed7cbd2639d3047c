//! Priority weight table.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Weights fed into the priority calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Weight added per plan tier.
    #[serde(default)]
    pub plan_weights: PlanWeights,
    /// Points subtracted per retry already spent.
    #[serde(default = "default_retry_penalty")]
    pub retry_penalty: i32,
    /// Seconds of waiting that earn one point of age bonus.
    #[serde(default = "default_age_bonus_interval")]
    pub age_bonus_interval_seconds: u64,
    /// Upper bound on the age bonus.
    #[serde(default = "default_max_age_bonus")]
    pub max_age_bonus: i32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            plan_weights: PlanWeights::default(),
            retry_penalty: default_retry_penalty(),
            age_bonus_interval_seconds: default_age_bonus_interval(),
            max_age_bonus: default_max_age_bonus(),
        }
    }
}

impl PriorityConfig {
    /// Tier weights must be strictly increasing and penalties non-negative.
    pub fn validate(&self) -> Result<(), AppError> {
        let w = &self.plan_weights;
        if !(w.basic < w.professional && w.professional < w.executive) {
            return Err(AppError::configuration(
                "priority.plan_weights must increase strictly from basic to executive",
            ));
        }
        if self.retry_penalty < 0 || self.max_age_bonus < 0 {
            return Err(AppError::configuration(
                "priority.retry_penalty and priority.max_age_bonus must not be negative",
            ));
        }
        if self.age_bonus_interval_seconds == 0 {
            return Err(AppError::configuration(
                "priority.age_bonus_interval_seconds must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Per-tier priority weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWeights {
    /// Basic plan.
    #[serde(default = "default_basic")]
    pub basic: i32,
    /// Professional plan.
    #[serde(default = "default_professional")]
    pub professional: i32,
    /// Executive plan.
    #[serde(default = "default_executive")]
    pub executive: i32,
}

impl Default for PlanWeights {
    fn default() -> Self {
        Self {
            basic: default_basic(),
            professional: default_professional(),
            executive: default_executive(),
        }
    }
}

fn default_retry_penalty() -> i32 {
    1
}

fn default_age_bonus_interval() -> u64 {
    60
}

fn default_max_age_bonus() -> i32 {
    2
}

fn default_basic() -> i32 {
    1
}

fn default_professional() -> i32 {
    2
}

fn default_executive() -> i32 {
    3
}
