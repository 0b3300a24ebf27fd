//! Host capabilities model

use serde::{Deserialize, Serialize};

/// Describes what a host can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Can query the current foreground application
    pub can_detect_foreground: bool,

    /// Emits `ForegroundChanged` events (event-driven triggering)
    pub can_observe_foreground_changes: bool,

    /// Can show an interstitial over another app
    pub can_present_interstitial: bool,

    /// Can list installed launchable apps
    pub can_enumerate_apps: bool,

    /// Emits `CapabilityGranted` / `CapabilityRevoked` events.
    /// When false the detection facility is assumed to be always present.
    pub can_report_capability: bool,
}

impl HostCapabilities {
    /// Create minimal capabilities (polling detection and presentation only)
    pub fn minimal() -> Self {
        Self {
            can_detect_foreground: true,
            can_observe_foreground_changes: false,
            can_present_interstitial: true,
            can_enumerate_apps: false,
            can_report_capability: false,
        }
    }

    /// Create capabilities for a Linux host running sway
    pub fn linux_sway() -> Self {
        Self {
            can_detect_foreground: true,
            can_observe_foreground_changes: true,
            can_present_interstitial: true,
            can_enumerate_apps: true,
            can_report_capability: true,
        }
    }

    /// Whether the monitor can run at all on this host
    pub fn can_enforce(&self) -> bool {
        self.can_detect_foreground && self.can_present_interstitial
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::minimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_capabilities() {
        let caps = HostCapabilities::minimal();
        assert!(caps.can_enforce());
        assert!(!caps.can_observe_foreground_changes);
        assert!(!caps.can_report_capability);
    }

    #[test]
    fn linux_sway_capabilities() {
        let caps = HostCapabilities::linux_sway();
        assert!(caps.can_enforce());
        assert!(caps.can_observe_foreground_changes);
        assert!(caps.can_enumerate_apps);
    }
}
