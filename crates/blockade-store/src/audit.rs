//! Audit event types

use blockade_api::Schedule;
use blockade_util::PackageId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Monitor loop started
    MonitorStarted { trigger: String },

    /// Monitor loop stopped
    MonitorStopped { reason: String },

    /// Interstitial shown over a blocked app
    InterstitialPresented { package: PackageId },

    /// Interstitial could not be shown
    PresentationFailed { package: PackageId, error: String },

    /// Policy could not be read for several cycles in a row
    PolicyUnavailable {
        consecutive_failures: u32,
        error: String,
    },

    /// Blocking turned on or off
    BlockingToggled { enabled: bool },

    /// Package added to the blocked set
    PackageBlocked { package: PackageId },

    /// Package removed from the blocked set
    PackageUnblocked { package: PackageId },

    /// Blocked set replaced wholesale
    BlockedSetReplaced { count: usize },

    /// Daily window changed or cleared
    ScheduleChanged { schedule: Schedule },
}

impl AuditEventType {
    /// One-line human readable description
    pub fn summary(&self) -> String {
        match self {
            AuditEventType::ServiceStarted => "service started".into(),
            AuditEventType::ServiceStopped => "service stopped".into(),
            AuditEventType::MonitorStarted { trigger } => {
                format!("monitor started ({} trigger)", trigger)
            }
            AuditEventType::MonitorStopped { reason } => format!("monitor stopped: {}", reason),
            AuditEventType::InterstitialPresented { package } => {
                format!("blocked {}", package)
            }
            AuditEventType::PresentationFailed { package, error } => {
                format!("failed to block {}: {}", package, error)
            }
            AuditEventType::PolicyUnavailable {
                consecutive_failures,
                error,
            } => format!(
                "policy unreadable for {} cycles: {}",
                consecutive_failures, error
            ),
            AuditEventType::BlockingToggled { enabled: true } => "blocking enabled".into(),
            AuditEventType::BlockingToggled { enabled: false } => "blocking disabled".into(),
            AuditEventType::PackageBlocked { package } => format!("added {}", package),
            AuditEventType::PackageUnblocked { package } => format!("removed {}", package),
            AuditEventType::BlockedSetReplaced { count } => {
                format!("blocked set replaced ({} apps)", count)
            }
            AuditEventType::ScheduleChanged { schedule } => format!("schedule set to {}", schedule),
        }
    }
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: blockade_util::now(),
            event,
        }
    }
}
