//! # genqueue-database
//!
//! Persistence adapters for GenQueue: the job record store and the credit
//! ledger. Each is defined as a trait with a PostgreSQL implementation
//! (`repositories`) and an in-process implementation (`memory`) used for
//! single-node deployments and tests.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod traits;

pub use connection::DatabasePool;
pub use traits::{CreditLedger, JobFilter, JobStore};
