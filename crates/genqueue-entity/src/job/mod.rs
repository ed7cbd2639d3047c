//! Generation job domain entities.

pub mod model;
pub mod params;
pub mod status;

pub use model::{CreateJob, Job};
pub use params::GenerationParams;
pub use status::{JobStatus, PlanTier};
