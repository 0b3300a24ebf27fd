//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Monitor tuning
    #[serde(default)]
    pub monitor: RawMonitorConfig,

    /// Interstitial command
    #[serde(default)]
    pub presenter: RawPresenterConfig,

    /// Blocked-set constraints
    #[serde(default)]
    pub policy: RawPolicyConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawServiceConfig {
    /// Data directory for the policy database
    pub data_dir: Option<PathBuf>,
}

/// How decision cycles are triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTrigger {
    /// Query the foreground on a fixed interval
    #[default]
    Polling,
    /// React to foreground-change events from the compositor
    Event,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawMonitorConfig {
    pub trigger: Option<RawTrigger>,

    /// Polling period in milliseconds (default: 5000)
    pub poll_interval_ms: Option<u64>,

    /// Present again after this long on the same blocked app; 0 disables
    pub rearm_after_seconds: Option<u64>,

    /// Bound on one presentation (default: 2000)
    pub present_timeout_ms: Option<u64>,

    /// Failed policy reads in a row before alerting (default: 12)
    pub policy_failure_alert_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawPresenterConfig {
    /// argv template; `{package}` and `{label}` are substituted
    pub command: Option<Vec<String>>,

    /// Package id of the interstitial itself; never blockable
    pub package_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawPolicyConfig {
    /// Additional packages that can never be blocked
    #[serde(default)]
    pub reserved_packages: Vec<String>,
}
