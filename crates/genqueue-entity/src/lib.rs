//! # genqueue-entity
//!
//! Domain entity models for GenQueue. Job records are database rows and
//! derive `sqlx::FromRow`; the remaining types are value objects shared
//! between the scheduler, the adapters, and the CLI.

pub mod generation;
pub mod job;
pub mod report;

pub use generation::{CacheMetadata, CachedGeneration};
pub use job::{CreateJob, GenerationParams, Job, JobStatus, PlanTier};
pub use report::{JobStatusReport, QueueHealth};
