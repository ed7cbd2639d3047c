//! # genqueue-core
//!
//! Shared building blocks for the GenQueue workspace:
//!
//! - [`config`]: the layered `AppConfig` and its sections
//! - [`error`]: [`AppError`] with a coarse [`error::ErrorKind`]
//! - [`types`]: `JobId` and `BatchId`
//! - [`traits`]: the [`traits::CacheProvider`] seam

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
