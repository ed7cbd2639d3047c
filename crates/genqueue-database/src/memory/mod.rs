//! In-process store and ledger implementations.

pub mod credit;
pub mod job;

pub use credit::MemoryCreditLedger;
pub use job::MemoryJobStore;
