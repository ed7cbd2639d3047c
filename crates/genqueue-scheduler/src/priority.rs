//! Priority calculation.

use std::time::Duration;

use genqueue_core::config::{ModelCatalog, PriorityConfig};
use genqueue_entity::job::PlanTier;

/// Lowest priority a job can have.
pub const MIN_PRIORITY: i32 = 1;
/// Highest priority a job can have.
pub const MAX_PRIORITY: i32 = 10;

/// Computes job priorities from the configured weight table.
///
/// Higher values run sooner. The result is always within
/// [`MIN_PRIORITY`]..=[`MAX_PRIORITY`].
#[derive(Debug, Clone)]
pub struct PriorityCalculator {
    config: PriorityConfig,
    catalog: ModelCatalog,
}

impl PriorityCalculator {
    /// Create a calculator over a weight table and model catalog.
    pub fn new(config: PriorityConfig, catalog: ModelCatalog) -> Self {
        Self { config, catalog }
    }

    /// Priority for a job.
    ///
    /// `waited` is how long the job has been in the queue; it earns one
    /// point per `age_bonus_interval_seconds`, capped at `max_age_bonus`.
    /// Unknown models get no complexity weight.
    pub fn calculate(
        &self,
        plan_tier: PlanTier,
        model_id: &str,
        base_priority: i32,
        retry_count: i32,
        waited: Duration,
    ) -> i32 {
        let tier = plan_tier.weight(&self.config.plan_weights);
        let complexity = self
            .catalog
            .get(model_id)
            .map(|profile| profile.complexity_weight)
            .unwrap_or(0);
        let penalty = self
            .config
            .retry_penalty
            .saturating_mul(retry_count.max(0));

        let score = base_priority
            .saturating_add(tier)
            .saturating_add(complexity)
            .saturating_sub(penalty)
            .saturating_add(self.age_bonus(waited));

        score.clamp(MIN_PRIORITY, MAX_PRIORITY)
    }

    fn age_bonus(&self, waited: Duration) -> i32 {
        let interval = self.config.age_bonus_interval_seconds.max(1);
        let steps = waited.as_secs() / interval;
        i32::try_from(steps)
            .unwrap_or(i32::MAX)
            .min(self.config.max_age_bonus)
    }
}
