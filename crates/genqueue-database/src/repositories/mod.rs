//! PostgreSQL-backed implementations of the store and ledger traits.

pub mod credit;
pub mod job;

pub use credit::CreditRepository;
pub use job::JobRepository;
