//! Generation job scheduling for GenQueue.
//!
//! This crate provides:
//! - A priority calculator driven by a configurable weight table
//! - A batch assembler grouping same-model jobs of similar urgency
//! - A batch executor running jobs through the result cache and the
//!   generation backend with bounded concurrency
//! - The queue orchestrator exposing submit, status, cancel and health
//! - A sweeper that force-dispatches full or stale batches on an interval

pub mod assembler;
pub mod backend;
pub mod batch;
pub mod executor;
pub mod orchestrator;
pub mod pricing;
pub mod priority;
pub mod status;
pub mod sweeper;

pub use backend::{GenerationBackend, GenerationError, HttpGenerationBackend};
pub use orchestrator::{QueueOrchestrator, SubmitError, SubmitRequest, SubmitResponse};
pub use priority::PriorityCalculator;
pub use sweeper::QueueSweeper;
