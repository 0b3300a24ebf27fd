//! The block predicate

use blockade_api::{BlockPolicy, Schedule};
use blockade_util::PackageId;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Why a foreground app was allowed to stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// Blocking is switched off
    Disabled,
    /// The foreground app is unknown
    NoForeground,
    /// The foreground app is not in the blocked set
    NotBlocked,
    /// Outside the daily window
    OutsideSchedule,
}

/// Result of evaluating the policy against one foreground sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum BlockDecision {
    Block,
    Allow(AllowReason),
}

impl BlockDecision {
    pub fn is_block(&self) -> bool {
        matches!(self, BlockDecision::Block)
    }
}

/// Whether blocking applies at the local wall-clock minute of `now`
pub fn within_schedule(schedule: &Schedule, now: &DateTime<Local>) -> bool {
    schedule.within_schedule(now)
}

/// Evaluate the policy; an `Allow` carries the first clause that failed.
pub fn evaluate(
    policy: &BlockPolicy,
    package: Option<&PackageId>,
    now: &DateTime<Local>,
) -> BlockDecision {
    if !policy.enabled {
        return BlockDecision::Allow(AllowReason::Disabled);
    }

    let Some(package) = package else {
        return BlockDecision::Allow(AllowReason::NoForeground);
    };

    if !policy.is_blocked(package) {
        return BlockDecision::Allow(AllowReason::NotBlocked);
    }

    if !within_schedule(&policy.schedule, now) {
        return BlockDecision::Allow(AllowReason::OutsideSchedule);
    }

    BlockDecision::Block
}

pub fn should_block(policy: &BlockPolicy, package: Option<&PackageId>, now: &DateTime<Local>) -> bool {
    evaluate(policy, package, now).is_block()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, hour, minute, 0).unwrap()
    }

    fn policy(enabled: bool, blocked: &[&str], schedule: Schedule) -> BlockPolicy {
        BlockPolicy {
            enabled,
            blocked_packages: blocked.iter().map(|p| PackageId::new(*p)).collect(),
            schedule,
        }
    }

    #[test]
    fn disabled_never_blocks() {
        let p = policy(false, &["com.x", "com.y"], Schedule::Always);
        for hour in [0, 6, 12, 18, 23] {
            for pkg in ["com.x", "com.y", "com.z"] {
                assert!(!should_block(&p, Some(&PackageId::new(pkg)), &at(hour, 0)));
            }
        }
        assert_eq!(
            evaluate(&p, Some(&PackageId::new("com.x")), &at(12, 0)),
            BlockDecision::Allow(AllowReason::Disabled)
        );
    }

    #[test]
    fn blocked_package_blocks_without_schedule() {
        let p = policy(true, &["com.x"], Schedule::Always);
        assert!(should_block(&p, Some(&PackageId::new("com.x")), &at(3, 17)));
    }

    #[test]
    fn unlisted_package_is_allowed() {
        let p = policy(true, &["com.x"], Schedule::Always);
        assert_eq!(
            evaluate(&p, Some(&PackageId::new("com.y")), &at(12, 0)),
            BlockDecision::Allow(AllowReason::NotBlocked)
        );
    }

    #[test]
    fn unknown_foreground_is_allowed() {
        let p = policy(true, &["com.x"], Schedule::Always);
        assert_eq!(
            evaluate(&p, None, &at(12, 0)),
            BlockDecision::Allow(AllowReason::NoForeground)
        );
    }

    #[test]
    fn overnight_schedule() {
        let p = policy(true, &["com.x"], Schedule::from_raw(22 * 60, 6 * 60).unwrap());
        let x = PackageId::new("com.x");

        assert!(should_block(&p, Some(&x), &at(23, 0)));
        assert!(should_block(&p, Some(&x), &at(2, 0)));
        assert_eq!(
            evaluate(&p, Some(&x), &at(12, 0)),
            BlockDecision::Allow(AllowReason::OutsideSchedule)
        );
    }

    #[test]
    fn daytime_schedule_is_half_open() {
        let schedule = Schedule::from_raw(8 * 60, 17 * 60).unwrap();
        assert!(within_schedule(&schedule, &at(9, 0)));
        assert!(!within_schedule(&schedule, &at(7, 59)));
        assert!(!within_schedule(&schedule, &at(17, 0)));
    }

    #[test]
    fn sentinel_schedule_always_within() {
        let schedule = Schedule::from_raw(-1, -1).unwrap();
        for hour in 0..24 {
            assert!(within_schedule(&schedule, &at(hour, 59)));
        }
    }
}
