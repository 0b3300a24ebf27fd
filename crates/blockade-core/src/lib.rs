//! Enforcement core for blockade
//!
//! This crate contains:
//! - The block predicate (enabled, foreground known, blocked, within schedule)
//! - The enforcement monitor running one decision cycle per tick, with debounce
//! - The controller that starts and stops the monitor loop

mod controller;
mod decision;
mod monitor;
mod state;

pub use controller::*;
pub use decision::*;
pub use monitor::*;
pub use state::*;
