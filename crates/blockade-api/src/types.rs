//! Value types exchanged between host, store and service

use blockade_util::PackageId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The foreground application observed at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundSample {
    /// None when nothing is focused or the foreground could not be determined
    pub package: Option<PackageId>,
    pub timestamp: DateTime<Local>,

    /// False when detection failed; `package` is then None
    pub detected: bool,
}

impl ForegroundSample {
    pub fn new(package: Option<PackageId>, timestamp: DateTime<Local>) -> Self {
        Self {
            package,
            timestamp,
            detected: true,
        }
    }

    pub fn unknown(timestamp: DateTime<Local>) -> Self {
        Self {
            package: None,
            timestamp,
            detected: false,
        }
    }
}

/// A launchable application known to the OS app registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub package: PackageId,
    pub label: String,
}

impl InstalledApp {
    pub fn new(package: impl Into<PackageId>, label: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            label: label.into(),
        }
    }

    /// Upper-cased first character of the label, `#` for non-letters
    pub fn section_key(&self) -> char {
        self.label
            .chars()
            .next()
            .filter(|c| c.is_alphabetic())
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('#')
    }
}

/// An entry of the blocked set, with the time it was added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedApp {
    pub package: PackageId,
    pub added_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_key_uppercases_first_letter() {
        assert_eq!(InstalledApp::new("org.mozilla.firefox", "firefox").section_key(), 'F');
        assert_eq!(InstalledApp::new("com.x", "Éclair").section_key(), 'É');
        assert_eq!(InstalledApp::new("com.y", "2048").section_key(), '#');
        assert_eq!(InstalledApp::new("com.z", "").section_key(), '#');
    }
}
