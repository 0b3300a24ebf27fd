//! Host trait interfaces for blockade
//!
//! This crate defines the capability-based interface between the enforcement
//! core and platform-specific implementations: foreground detection,
//! interstitial presentation, installed-app enumeration and tick sources.
//! It contains no platform code itself.

mod capabilities;
mod mock;
mod tick;
mod traits;

pub use capabilities::*;
pub use mock::*;
pub use tick::*;
pub use traits::*;
