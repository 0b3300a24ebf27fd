//! Host traits

use async_trait::async_trait;
use blockade_api::InstalledApp;
use blockade_util::PackageId;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::HostCapabilities;

/// Errors from host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host facility unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Presentation failed: {0}")]
    PresentFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Events from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The facility required for foreground detection became available
    CapabilityGranted,

    /// The facility required for foreground detection went away
    CapabilityRevoked,

    /// The foreground application changed
    ForegroundChanged { package: Option<PackageId> },
}

/// Reports which application is currently in the foreground.
#[async_trait]
pub trait ForegroundDetector: Send + Sync {
    /// `Ok(None)` when nothing identifiable has focus
    async fn current_foreground(&self) -> HostResult<Option<PackageId>>;
}

/// Shows the "blocked" interstitial over a foreground app.
///
/// Fire-and-forget: returns once the interstitial has been launched, not when
/// the user dismisses it. Safe to call repeatedly.
#[async_trait]
pub trait InterruptionPresenter: Send + Sync {
    async fn present(&self, package: &PackageId) -> HostResult<()>;
}

/// Read-only view of the launchable applications installed on the host
pub trait AppRegistry: Send + Sync {
    fn installed_apps(&self) -> HostResult<Vec<InstalledApp>>;

    /// Display label for a package, if the registry knows it
    fn label_for(&self, package: &PackageId) -> Option<String> {
        self.installed_apps()
            .ok()?
            .into_iter()
            .find(|app| &app.package == package)
            .map(|app| app.label)
    }
}

/// Host adapter: capabilities and the event stream
pub trait HostAdapter: Send + Sync {
    /// Get the capabilities of this host
    fn capabilities(&self) -> &HostCapabilities;

    /// Subscribe to host events. Only one subscriber is supported.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent>;
}
