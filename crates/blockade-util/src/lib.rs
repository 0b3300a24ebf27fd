//! Shared utilities for blockade
//!
//! This crate provides:
//! - The `PackageId` identifier type
//! - Time utilities (mockable wall clock, monotonic time, daily windows)
//! - Shared validation error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
