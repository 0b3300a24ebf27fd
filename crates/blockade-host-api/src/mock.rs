//! Mock host for testing

use async_trait::async_trait;
use blockade_api::InstalledApp;
use blockade_util::PackageId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    AppRegistry, ForegroundDetector, HostAdapter, HostCapabilities, HostError, HostEvent,
    HostResult, InterruptionPresenter,
};

/// Mock host for unit/integration testing.
///
/// The foreground is either a fixed value or a script consumed one sample per
/// detector query; once the script runs out the last scripted value sticks.
pub struct MockHost {
    capabilities: HostCapabilities,
    foreground_script: Arc<Mutex<VecDeque<Option<PackageId>>>>,
    current_foreground: Arc<Mutex<Option<PackageId>>>,
    presentations: Arc<Mutex<Vec<PackageId>>>,
    apps: Arc<Mutex<Vec<InstalledApp>>>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>>,

    /// Configure detection to fail
    pub fail_detect: Arc<Mutex<bool>>,

    /// Configure presentation to fail
    pub fail_present: Arc<Mutex<bool>>,

    /// Delay before a presentation completes (simulates a slow host)
    pub present_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockHost {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            capabilities: HostCapabilities::minimal(),
            foreground_script: Arc::new(Mutex::new(VecDeque::new())),
            current_foreground: Arc::new(Mutex::new(None)),
            presentations: Arc::new(Mutex::new(Vec::new())),
            apps: Arc::new(Mutex::new(Vec::new())),
            event_tx: tx,
            event_rx: Arc::new(Mutex::new(Some(rx))),
            fail_detect: Arc::new(Mutex::new(false)),
            fail_present: Arc::new(Mutex::new(false)),
            present_delay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_capabilities(mut self, caps: HostCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    pub fn with_apps(self, apps: Vec<InstalledApp>) -> Self {
        *self.apps.lock().unwrap() = apps;
        self
    }

    /// Fix the foreground to a single value, discarding any script
    pub fn set_foreground(&self, package: Option<&str>) {
        self.foreground_script.lock().unwrap().clear();
        *self.current_foreground.lock().unwrap() = package.map(PackageId::new);
    }

    /// Queue foreground samples returned by successive detector queries
    pub fn script_foreground<'a>(&self, samples: impl IntoIterator<Item = Option<&'a str>>) {
        self.foreground_script
            .lock()
            .unwrap()
            .extend(samples.into_iter().map(|s| s.map(PackageId::new)));
    }

    /// Packages presented so far, in order
    pub fn presentations(&self) -> Vec<PackageId> {
        self.presentations.lock().unwrap().clone()
    }

    pub fn presentation_count(&self) -> usize {
        self.presentations.lock().unwrap().len()
    }

    pub fn set_fail_detect(&self, fail: bool) {
        *self.fail_detect.lock().unwrap() = fail;
    }

    pub fn set_fail_present(&self, fail: bool) {
        *self.fail_present.lock().unwrap() = fail;
    }

    pub fn set_present_delay(&self, delay: Option<Duration>) {
        *self.present_delay.lock().unwrap() = delay;
    }

    /// Simulate the detection facility becoming available
    pub fn grant_capability(&self) {
        let _ = self.event_tx.send(HostEvent::CapabilityGranted);
    }

    /// Simulate the detection facility being withdrawn
    pub fn revoke_capability(&self) {
        let _ = self.event_tx.send(HostEvent::CapabilityRevoked);
    }

    /// Simulate a foreground change notification; also updates the detector
    pub fn emit_foreground_change(&self, package: Option<&str>) {
        let package = package.map(PackageId::new);
        *self.current_foreground.lock().unwrap() = package.clone();
        let _ = self
            .event_tx
            .send(HostEvent::ForegroundChanged { package });
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForegroundDetector for MockHost {
    async fn current_foreground(&self) -> HostResult<Option<PackageId>> {
        if *self.fail_detect.lock().unwrap() {
            return Err(HostError::Unavailable("Mock detection failure".into()));
        }

        let mut current = self.current_foreground.lock().unwrap();
        if let Some(next) = self.foreground_script.lock().unwrap().pop_front() {
            *current = next;
        }
        Ok(current.clone())
    }
}

#[async_trait]
impl InterruptionPresenter for MockHost {
    async fn present(&self, package: &PackageId) -> HostResult<()> {
        let delay = *self.present_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_present.lock().unwrap() {
            return Err(HostError::PresentFailed("Mock presentation failure".into()));
        }

        self.presentations.lock().unwrap().push(package.clone());
        Ok(())
    }
}

impl AppRegistry for MockHost {
    fn installed_apps(&self) -> HostResult<Vec<InstalledApp>> {
        Ok(self.apps.lock().unwrap().clone())
    }
}

impl HostAdapter for MockHost {
    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        self.event_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_foreground_then_sticks() {
        let host = MockHost::new();
        host.script_foreground([Some("com.x"), None, Some("com.y")]);

        assert_eq!(
            host.current_foreground().await.unwrap(),
            Some(PackageId::new("com.x"))
        );
        assert_eq!(host.current_foreground().await.unwrap(), None);
        assert_eq!(
            host.current_foreground().await.unwrap(),
            Some(PackageId::new("com.y"))
        );
        assert_eq!(
            host.current_foreground().await.unwrap(),
            Some(PackageId::new("com.y"))
        );
    }

    #[tokio::test]
    async fn presentations_are_recorded() {
        let host = MockHost::new();
        host.present(&PackageId::new("com.x")).await.unwrap();
        host.present(&PackageId::new("com.x")).await.unwrap();

        assert_eq!(host.presentation_count(), 2);
    }

    #[tokio::test]
    async fn failure_flags() {
        let host = MockHost::new();
        host.set_fail_detect(true);
        host.set_fail_present(true);

        assert!(host.current_foreground().await.is_err());
        assert!(host.present(&PackageId::new("com.x")).await.is_err());
        assert_eq!(host.presentation_count(), 0);
    }

    #[tokio::test]
    async fn events_reach_subscriber() {
        let host = MockHost::new();
        let mut rx = host.subscribe();

        host.grant_capability();
        host.emit_foreground_change(Some("com.x"));

        assert_eq!(rx.recv().await, Some(HostEvent::CapabilityGranted));
        assert_eq!(
            rx.recv().await,
            Some(HostEvent::ForegroundChanged {
                package: Some(PackageId::new("com.x"))
            })
        );
        assert_eq!(
            host.current_foreground().await.unwrap(),
            Some(PackageId::new("com.x"))
        );
    }
}
