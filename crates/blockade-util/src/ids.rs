//! Strongly-typed identifiers for blockade

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BlockadeError, Result};

/// Longest package id accepted from user input
pub const MAX_PACKAGE_ID_LEN: usize = 255;

/// Identifier of an installed application (its key in the OS app registry).
///
/// On Android this is the package name (`com.example.app`); on Linux it is the
/// desktop entry id / Wayland `app_id` (`org.mozilla.firefox`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Wrap an id coming from a trusted source (the OS, the store)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate an id typed by a user or read from config
    pub fn parse(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();

        if id.is_empty() {
            return Err(BlockadeError::package(id, "cannot be empty"));
        }
        if id.len() > MAX_PACKAGE_ID_LEN {
            return Err(BlockadeError::package(
                id,
                format!("longer than {} bytes", MAX_PACKAGE_ID_LEN),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BlockadeError::package(
                id,
                "cannot contain whitespace or control characters",
            ));
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::str::FromStr for PackageId {
    type Err = BlockadeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
