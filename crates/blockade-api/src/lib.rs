//! Domain types for blockade
//!
//! This crate defines the values shared between the service, the store and
//! the command-line surface:
//! - The block policy and its daily schedule
//! - Foreground samples
//! - Installed and blocked app views

mod policy;
mod types;

pub use policy::*;
pub use types::*;
