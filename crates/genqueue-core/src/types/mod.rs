//! Core type definitions used across the GenQueue workspace.

pub mod id;

pub use id::*;
