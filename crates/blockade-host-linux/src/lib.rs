//! Linux host adapter for blockaded
//!
//! Provides:
//! - Foreground detection through the sway IPC, polled or event-driven
//! - Capability reporting when the sway socket comes and goes
//! - Interstitial presentation via an external command in its own process group
//! - Installed app enumeration from XDG desktop entries

mod adapter;
mod presenter;
mod registry;
mod sway;

pub use adapter::*;
pub use presenter::*;
pub use registry::*;
pub use sway::{focused_package, parse_window_event, query_foreground};
