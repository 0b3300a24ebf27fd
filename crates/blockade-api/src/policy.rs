//! The block policy read by the enforcement monitor each cycle

use blockade_util::{BlockadeError, DailyWindow, MinuteOfDay, PackageId, MINUTES_PER_DAY};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Raw value stored for an unset schedule bound
pub const SCHEDULE_UNSET: i32 = -1;

/// When blocking applies during the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// No window configured: blocking applies at all times
    #[default]
    Always,
    /// Blocking applies only inside the daily window
    Daily(DailyWindow),
}

impl Schedule {
    pub fn daily(start: MinuteOfDay, end: MinuteOfDay) -> Self {
        Schedule::Daily(DailyWindow::new(start, end))
    }

    /// Build from the persisted pair of minutes, `(-1, -1)` meaning unset.
    pub fn from_raw(start: i32, end: i32) -> Result<Self, BlockadeError> {
        match (start, end) {
            (SCHEDULE_UNSET, SCHEDULE_UNSET) => Ok(Schedule::Always),
            (SCHEDULE_UNSET, _) | (_, SCHEDULE_UNSET) => Err(BlockadeError::schedule(
                start,
                end,
                "start and end must both be set or both be unset",
            )),
            _ => {
                let start_min = raw_minute(start).ok_or_else(|| out_of_range(start, end))?;
                let end_min = raw_minute(end).ok_or_else(|| out_of_range(start, end))?;
                Ok(Schedule::daily(start_min, end_min))
            }
        }
    }

    /// Inverse of [`Schedule::from_raw`]
    pub fn to_raw(&self) -> (i32, i32) {
        match self {
            Schedule::Always => (SCHEDULE_UNSET, SCHEDULE_UNSET),
            Schedule::Daily(window) => (
                window.start.as_minutes() as i32,
                window.end.as_minutes() as i32,
            ),
        }
    }

    /// Whether blocking applies at the local wall-clock minute of `now`
    pub fn within_schedule(&self, now: &DateTime<Local>) -> bool {
        match self {
            Schedule::Always => true,
            Schedule::Daily(window) => window.contains(now),
        }
    }

    pub fn window(&self) -> Option<&DailyWindow> {
        match self {
            Schedule::Always => None,
            Schedule::Daily(window) => Some(window),
        }
    }
}

fn raw_minute(value: i32) -> Option<MinuteOfDay> {
    u16::try_from(value).ok().and_then(MinuteOfDay::new)
}

fn out_of_range(start: i32, end: i32) -> BlockadeError {
    BlockadeError::schedule(
        start,
        end,
        format!("minutes must be in 0..{}", MINUTES_PER_DAY),
    )
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Always => write!(f, "always"),
            Schedule::Daily(window) => write!(f, "daily {}", window),
        }
    }
}

/// Point-in-time snapshot of the user's blocking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPolicy {
    pub enabled: bool,
    pub blocked_packages: BTreeSet<PackageId>,
    pub schedule: Schedule,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_packages: BTreeSet::new(),
            schedule: Schedule::Always,
        }
    }
}

impl BlockPolicy {
    pub fn is_blocked(&self, package: &PackageId) -> bool {
        self.blocked_packages.contains(package)
    }

    /// Blocking is enabled and the schedule covers `now`
    pub fn is_active_at(&self, now: &DateTime<Local>) -> bool {
        self.enabled && self.schedule.within_schedule(now)
    }
}
