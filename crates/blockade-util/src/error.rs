//! Error types shared across blockade crates

use thiserror::Error;

/// Validation and general errors for blockade values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockadeError {
    #[error("Invalid package id '{value}': {reason}")]
    InvalidPackageId { value: String, reason: String },

    #[error("Invalid schedule ({start}, {end}): {reason}")]
    InvalidSchedule { start: i32, end: i32, reason: String },

    #[error("Invalid time '{value}': expected HH:MM")]
    InvalidTime { value: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlockadeError {
    pub fn package(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPackageId {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn schedule(start: i32, end: i32, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            start,
            end,
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BlockadeError>;
