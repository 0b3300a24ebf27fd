//! Validated configuration structures

use crate::schema::{RawConfig, RawPresenterConfig, RawTrigger};
use blockade_util::{PackageId, data_dir_without_env};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;
pub const DEFAULT_PRESENT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_POLICY_FAILURE_ALERT_THRESHOLD: u32 = 12;

/// Package id of the default interstitial
pub const DEFAULT_PRESENTER_PACKAGE: &str = "swaynag";

/// Validated configuration ready for use by the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    pub monitor: MonitorConfig,
    pub presenter: PresenterConfig,

    /// Configured packages that can never be blocked
    pub reserved_packages: BTreeSet<PackageId>,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let monitor = &raw.monitor;

        let monitor = MonitorConfig {
            trigger: match monitor.trigger.unwrap_or_default() {
                RawTrigger::Polling => TriggerMode::Polling,
                RawTrigger::Event => TriggerMode::Event,
            },
            poll_interval: Duration::from_millis(
                monitor.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            rearm_after: monitor
                .rearm_after_seconds
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            present_timeout: Duration::from_millis(
                monitor
                    .present_timeout_ms
                    .unwrap_or(DEFAULT_PRESENT_TIMEOUT_MS),
            ),
            policy_failure_alert_threshold: monitor
                .policy_failure_alert_threshold
                .unwrap_or(DEFAULT_POLICY_FAILURE_ALERT_THRESHOLD),
        };

        Self {
            service: ServiceConfig {
                data_dir: raw.service.data_dir.unwrap_or_else(data_dir_without_env),
            },
            monitor,
            presenter: PresenterConfig::from_raw(raw.presenter),
            reserved_packages: raw
                .policy
                .reserved_packages
                .iter()
                .map(PackageId::new)
                .collect(),
        }
    }

    /// Every package the store must refuse: configured ones plus the interstitial
    pub fn reserved(&self) -> BTreeSet<PackageId> {
        let mut reserved = self.reserved_packages.clone();
        reserved.insert(self.presenter.package_id.clone());
        reserved
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir_without_env(),
        }
    }
}

/// How decision cycles are triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    #[default]
    Polling,
    Event,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Polling => "polling",
            TriggerMode::Event => "event",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub trigger: TriggerMode,
    pub poll_interval: Duration,
    /// None presents once per entry into a blocked app
    pub rearm_after: Option<Duration>,
    pub present_timeout: Duration,
    pub policy_failure_alert_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::Polling,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            rearm_after: None,
            present_timeout: Duration::from_millis(DEFAULT_PRESENT_TIMEOUT_MS),
            policy_failure_alert_threshold: DEFAULT_POLICY_FAILURE_ALERT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterConfig {
    /// argv template; `{package}` and `{label}` are substituted
    pub command: Vec<String>,
    pub package_id: PackageId,
}

impl PresenterConfig {
    fn from_raw(raw: RawPresenterConfig) -> Self {
        let default = Self::default();
        Self {
            command: raw.command.unwrap_or(default.command),
            package_id: raw
                .package_id
                .map(PackageId::new)
                .unwrap_or(default.package_id),
        }
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "swaynag".into(),
                "-m".into(),
                "The app {label} is blocked!".into(),
            ],
            package_id: PackageId::new(DEFAULT_PRESENTER_PACKAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_includes_presenter() {
        let mut config = Config::default();
        config
            .reserved_packages
            .insert(PackageId::new("org.gnome.Settings"));

        let reserved = config.reserved();
        assert!(reserved.contains(&PackageId::new("swaynag")));
        assert!(reserved.contains(&PackageId::new("org.gnome.Settings")));
    }

    #[test]
    fn zero_rearm_means_off() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1
            [monitor]
            rearm_after_seconds = 0
            "#,
        )
        .unwrap();
        assert_eq!(Config::from_raw(raw).monitor.rearm_after, None);
    }
}
