//! Start/stop lifecycle of the monitor loop

use blockade_host_api::TickSource;
use blockade_util::MonotonicInstant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::EnforcementMonitor;

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A loop is already running; nothing was spawned
    AlreadyRunning,
}

/// Owns at most one running monitor loop
#[derive(Default)]
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the monitor loop driven by `ticks`.
    ///
    /// The loop ends when stopped or when the tick source is exhausted; a loop
    /// that ended on its own can be started again.
    pub fn start(
        &mut self,
        monitor: EnforcementMonitor,
        ticks: Box<dyn TickSource>,
    ) -> StartOutcome {
        if self.is_running() {
            debug!("Monitor already running");
            return StartOutcome::AlreadyRunning;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(monitor, ticks, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Monitor started");
        StartOutcome::Started
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// Returns false when no loop was running. Once this returns no further
    /// cycle runs.
    pub async fn stop(&mut self) -> bool {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return false;
        };

        let was_running = !handle.is_finished();
        if let Err(e) = handle.await {
            warn!(error = %e, "Monitor loop task failed to join");
        }
        if was_running {
            info!("Monitor stopped");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn monitor_loop(
    mut monitor: EnforcementMonitor,
    mut ticks: Box<dyn TickSource>,
    cancel_token: CancellationToken,
) {
    loop {
        let tick = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            tick = ticks.next_tick() => match tick {
                Some(tick) => tick,
                None => {
                    info!("Tick source exhausted, monitor loop ending");
                    break;
                }
            },
        };

        // A cycle in progress completes; its presenter call is time-bounded
        monitor
            .run_cycle(tick, blockade_util::now(), MonotonicInstant::now())
            .await;
    }

    debug!("Monitor loop exited");
}
