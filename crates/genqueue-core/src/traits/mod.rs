//! Core traits defined in `genqueue-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
