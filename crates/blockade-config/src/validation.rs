//! Configuration validation

use crate::config::{
    DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS,
};
use crate::schema::{RawConfig, RawMonitorConfig, RawPresenterConfig};
use blockade_util::PackageId;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("[monitor] {field}: {message}")]
    MonitorError { field: String, message: String },

    #[error("[presenter] {0}")]
    PresenterError(String),

    #[error("Invalid package id '{value}' in {location}: {message}")]
    InvalidPackageId {
        location: String,
        value: String,
        message: String,
    },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_monitor(&config.monitor));
    errors.extend(validate_presenter(&config.presenter));

    for value in &config.policy.reserved_packages {
        if let Err(e) = PackageId::parse(value) {
            errors.push(ValidationError::InvalidPackageId {
                location: "[policy] reserved_packages".into(),
                value: value.clone(),
                message: e.to_string(),
            });
        }
    }

    if let Some(dir) = &config.service.data_dir
        && dir.as_os_str().is_empty()
    {
        errors.push(ValidationError::GlobalError(
            "[service] data_dir cannot be empty".into(),
        ));
    }

    errors
}

fn monitor_error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::MonitorError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_monitor(monitor: &RawMonitorConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let poll_interval_ms = monitor.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&poll_interval_ms) {
        errors.push(monitor_error(
            "poll_interval_ms",
            format!(
                "{} is outside {}..={}",
                poll_interval_ms, MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS
            ),
        ));
    }

    if monitor.present_timeout_ms == Some(0) {
        errors.push(monitor_error("present_timeout_ms", "must be greater than 0"));
    }

    if monitor.policy_failure_alert_threshold == Some(0) {
        errors.push(monitor_error(
            "policy_failure_alert_threshold",
            "must be greater than 0",
        ));
    }

    // A re-arm shorter than one poll could never be observed
    if let Some(rearm) = monitor.rearm_after_seconds
        && rearm > 0
        && rearm.saturating_mul(1000) < poll_interval_ms
    {
        errors.push(monitor_error(
            "rearm_after_seconds",
            format!(
                "{}s is shorter than the poll interval ({}ms)",
                rearm, poll_interval_ms
            ),
        ));
    }

    errors
}

fn validate_presenter(presenter: &RawPresenterConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(command) = &presenter.command {
        match command.first() {
            None => errors.push(ValidationError::PresenterError(
                "command cannot be empty".into(),
            )),
            Some(program) if program.trim().is_empty() => errors.push(
                ValidationError::PresenterError("command program cannot be empty".into()),
            ),
            Some(_) => {}
        }
    }

    if let Some(value) = &presenter.package_id
        && let Err(e) = PackageId::parse(value)
    {
        errors.push(ValidationError::InvalidPackageId {
            location: "[presenter] package_id".into(),
            value: value.clone(),
            message: e.to_string(),
        });
    }

    errors
}
