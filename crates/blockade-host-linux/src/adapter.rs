//! Linux host adapter implementation

use async_trait::async_trait;
use blockade_api::InstalledApp;
use blockade_host_api::{
    AppRegistry, ForegroundDetector, HostAdapter, HostCapabilities, HostEvent, HostResult,
};
use blockade_util::PackageId;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::registry::DesktopEntryRegistry;
use crate::sway;

/// How often the sway IPC is probed for availability
pub const DEFAULT_CAPABILITY_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Linux host adapter backed by sway and XDG desktop entries
pub struct LinuxHost {
    capabilities: HostCapabilities,
    registry: Arc<DesktopEntryRegistry>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self::with_registry(DesktopEntryRegistry::from_env())
    }

    pub fn with_registry(registry: DesktopEntryRegistry) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            capabilities: HostCapabilities::linux_sway(),
            registry: Arc::new(registry),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Shared handle to the app registry, for the presenter's label lookup
    pub fn registry(&self) -> Arc<DesktopEntryRegistry> {
        self.registry.clone()
    }

    /// Probe the sway IPC periodically and report transitions.
    ///
    /// The first probe always produces an event so the subscriber learns the
    /// initial state.
    pub fn start_capability_watcher(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut available: Option<bool> = None;

            loop {
                interval.tick().await;

                let now_available = sway::is_ipc_available().await;
                if available == Some(now_available) {
                    continue;
                }
                available = Some(now_available);

                let event = if now_available {
                    info!("sway IPC available");
                    HostEvent::CapabilityGranted
                } else {
                    warn!("sway IPC unavailable");
                    HostEvent::CapabilityRevoked
                };

                if event_tx.send(event).is_err() {
                    debug!("Host event receiver dropped, stopping capability watcher");
                    break;
                }
            }
        })
    }

    /// Forward sway focus changes as host events
    pub fn start_focus_watcher(&self) -> tokio::task::JoinHandle<()> {
        let event_tx = self.event_tx.clone();
        tokio::spawn(sway::watch_focus(event_tx))
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForegroundDetector for LinuxHost {
    async fn current_foreground(&self) -> HostResult<Option<PackageId>> {
        sway::query_foreground().await
    }
}

impl AppRegistry for LinuxHost {
    fn installed_apps(&self) -> HostResult<Vec<InstalledApp>> {
        self.registry.installed_apps()
    }
}

impl HostAdapter for LinuxHost {
    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        self.event_rx
            .lock()
            .ok()
            .and_then(|mut rx| rx.take())
            .expect("subscribe() can only be called once")
    }
}
