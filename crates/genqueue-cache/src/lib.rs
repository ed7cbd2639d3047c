//! # genqueue-cache
//!
//! Generation result cache. [`ResultCache`] stores backend results under
//! request fingerprints on top of one of two backends:
//!
//! - **memory**: in-process, using [moka](https://crates.io/crates/moka)
//! - **redis**: shared, using the [redis](https://crates.io/crates/redis) crate

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod result;

pub use provider::CacheManager;
pub use result::ResultCache;
