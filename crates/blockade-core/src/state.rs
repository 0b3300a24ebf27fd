//! Per-run monitor state

use blockade_util::{MonotonicInstant, PackageId};
use std::time::Duration;

/// The package an interstitial was last shown for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastBlocked {
    pub package: PackageId,
    pub presented_at: MonotonicInstant,
}

/// State owned by one monitor run; discarded when the monitor stops.
#[derive(Debug, Default)]
pub struct MonitorState {
    /// Debounce memory: set on a successful presentation, cleared when a
    /// non-blocked app or no app is seen in the foreground
    pub last_blocked: Option<LastBlocked>,

    /// Policy reads that failed in a row
    pub consecutive_policy_failures: u32,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether presenting for `package` now would repeat the last interstitial.
    ///
    /// With `rearm_after` set, a repeat is allowed once that long has passed
    /// since the last presentation.
    pub fn is_suppressed(
        &self,
        package: &PackageId,
        now_mono: MonotonicInstant,
        rearm_after: Option<Duration>,
    ) -> bool {
        let Some(last) = &self.last_blocked else {
            return false;
        };
        if &last.package != package {
            return false;
        }

        match rearm_after {
            Some(interval) => now_mono.duration_since(last.presented_at) < interval,
            None => true,
        }
    }

    pub fn record_presented(&mut self, package: PackageId, now_mono: MonotonicInstant) {
        self.last_blocked = Some(LastBlocked {
            package,
            presented_at: now_mono,
        });
    }

    /// Forget the last blocked package; returns it if there was one
    pub fn clear_last_blocked(&mut self) -> Option<PackageId> {
        self.last_blocked.take().map(|last| last.package)
    }

    /// Count a failed policy read; returns the new streak length
    pub fn record_policy_failure(&mut self) -> u32 {
        self.consecutive_policy_failures = self.consecutive_policy_failures.saturating_add(1);
        self.consecutive_policy_failures
    }

    /// Reset the failure streak; returns how long it was
    pub fn record_policy_success(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive_policy_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_package_is_suppressed_until_cleared() {
        let mut state = MonitorState::new();
        let x = PackageId::new("com.x");
        let t0 = MonotonicInstant::now();

        assert!(!state.is_suppressed(&x, t0, None));
        state.record_presented(x.clone(), t0);
        assert!(state.is_suppressed(&x, t0 + Duration::from_secs(3600), None));
        assert!(!state.is_suppressed(&PackageId::new("com.y"), t0, None));

        assert_eq!(state.clear_last_blocked(), Some(x.clone()));
        assert!(!state.is_suppressed(&x, t0, None));
    }

    #[test]
    fn rearm_interval_lifts_suppression() {
        let mut state = MonitorState::new();
        let x = PackageId::new("com.x");
        let t0 = MonotonicInstant::now();
        let rearm = Some(Duration::from_secs(60));

        state.record_presented(x.clone(), t0);
        assert!(state.is_suppressed(&x, t0 + Duration::from_secs(59), rearm));
        assert!(!state.is_suppressed(&x, t0 + Duration::from_secs(60), rearm));
    }

    #[test]
    fn policy_failure_streak() {
        let mut state = MonitorState::new();
        assert_eq!(state.record_policy_failure(), 1);
        assert_eq!(state.record_policy_failure(), 2);
        assert_eq!(state.record_policy_success(), 2);
        assert_eq!(state.consecutive_policy_failures, 0);
    }
}
