//! Credit cost of a generation request.

use genqueue_core::config::ModelProfile;
use genqueue_entity::job::GenerationParams;

/// Credits charged for a request: the model's per-output rate times the
/// number of outputs requested.
pub fn credit_cost(profile: &ModelProfile, params: &GenerationParams) -> i64 {
    profile
        .credits_per_output
        .saturating_mul(i64::from(params.num_outputs))
}
