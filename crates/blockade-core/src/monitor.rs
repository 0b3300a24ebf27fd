//! The enforcement monitor: one decision cycle per tick

use blockade_api::ForegroundSample;
use blockade_host_api::{ForegroundDetector, InterruptionPresenter, Tick};
use blockade_store::{AuditEvent, AuditEventType, PolicyStore};
use blockade_util::{MonotonicInstant, PackageId};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::{AllowReason, BlockDecision, MonitorState, evaluate};

/// Default bound on a single presentation
pub const DEFAULT_PRESENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of failed policy reads in a row before alerting
pub const DEFAULT_POLICY_FAILURE_ALERT_THRESHOLD: u32 = 12;

/// Tunables for the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Re-present while the user stays on a blocked app; None presents once
    /// per entry into the app
    pub rearm_after: Option<Duration>,

    /// Upper bound on a presentation before it counts as failed
    pub present_timeout: Duration,

    /// Consecutive policy read failures that raise an error and an audit record
    pub policy_failure_alert_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            rearm_after: None,
            present_timeout: DEFAULT_PRESENT_TIMEOUT,
            policy_failure_alert_threshold: DEFAULT_POLICY_FAILURE_ALERT_THRESHOLD,
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The policy could not be read; nothing was evaluated
    Skipped,

    /// Nothing to block
    Idle {
        package: Option<PackageId>,
        reason: AllowReason,
    },

    /// Blocked app, but the interstitial is already showing for it
    Suppressed { package: PackageId },

    /// Interstitial shown
    Presented { package: PackageId },

    /// Interstitial could not be shown; retried next cycle
    PresentationFailed { package: PackageId, error: String },
}

/// Decides, once per tick, whether to interrupt the foreground app
pub struct EnforcementMonitor {
    store: Arc<dyn PolicyStore>,
    detector: Arc<dyn ForegroundDetector>,
    presenter: Arc<dyn InterruptionPresenter>,
    settings: MonitorSettings,
    state: MonitorState,
    outcome_tx: Option<mpsc::UnboundedSender<CycleOutcome>>,
}

impl EnforcementMonitor {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        detector: Arc<dyn ForegroundDetector>,
        presenter: Arc<dyn InterruptionPresenter>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            detector,
            presenter,
            settings,
            state: MonitorState::new(),
            outcome_tx: None,
        }
    }

    /// Forward every cycle outcome to `tx`
    pub fn with_outcome_sink(mut self, tx: mpsc::UnboundedSender<CycleOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run one decision cycle
    pub async fn run_cycle(
        &mut self,
        tick: Tick,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> CycleOutcome {
        let outcome = self.cycle(tick, now, now_mono).await;

        if let Some(tx) = &self.outcome_tx {
            let _ = tx.send(outcome.clone());
        }

        outcome
    }

    async fn cycle(
        &mut self,
        tick: Tick,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> CycleOutcome {
        // Fresh snapshot every cycle so edits take effect on the next tick
        let policy = match self.store.get_policy() {
            Ok(policy) => {
                let failures = self.state.record_policy_success();
                if failures > 0 {
                    info!(failures, "Policy readable again");
                }
                policy
            }
            Err(e) => {
                self.on_policy_failure(&e.to_string());
                return CycleOutcome::Skipped;
            }
        };

        let sample = self.sample_foreground(tick, now).await;
        let detected = sample.detected;
        let package = sample.package;

        match evaluate(&policy, package.as_ref(), &now) {
            BlockDecision::Block => {
                // evaluate only blocks a known package
                let Some(package) = package else {
                    return CycleOutcome::Idle {
                        package: None,
                        reason: AllowReason::NoForeground,
                    };
                };
                self.enforce(package, now_mono).await
            }
            BlockDecision::Allow(reason) => {
                // Only a failed detection keeps the debounce
                if detected
                    && let Some(previous) = self.state.clear_last_blocked()
                {
                    debug!(
                        previous = %previous,
                        reason = ?reason,
                        "Left blocked app, debounce re-armed"
                    );
                }
                trace!(package = ?package, reason = ?reason, "Foreground allowed");
                CycleOutcome::Idle { package, reason }
            }
        }
    }

    async fn sample_foreground(&self, tick: Tick, now: DateTime<Local>) -> ForegroundSample {
        match tick {
            Tick::ForegroundChanged { package } => ForegroundSample::new(package, now),
            Tick::Interval => match self.detector.current_foreground().await {
                Ok(package) => ForegroundSample::new(package, now),
                Err(e) => {
                    debug!(error = %e, "Foreground detection failed");
                    ForegroundSample::unknown(now)
                }
            },
        }
    }

    async fn enforce(&mut self, package: PackageId, now_mono: MonotonicInstant) -> CycleOutcome {
        if self
            .state
            .is_suppressed(&package, now_mono, self.settings.rearm_after)
        {
            trace!(package = %package, "Interstitial already shown");
            return CycleOutcome::Suppressed { package };
        }

        let result = tokio::time::timeout(
            self.settings.present_timeout,
            self.presenter.present(&package),
        )
        .await;

        let error = match result {
            Ok(Ok(())) => {
                info!(package = %package, "Interstitial presented");
                self.state.record_presented(package.clone(), now_mono);
                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::InterstitialPresented {
                        package: package.clone(),
                    },
                ));
                return CycleOutcome::Presented { package };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}ms",
                self.settings.present_timeout.as_millis()
            ),
        };

        warn!(package = %package, error = %error, "Failed to present interstitial");
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PresentationFailed {
                package: package.clone(),
                error: error.clone(),
            }));

        CycleOutcome::PresentationFailed { package, error }
    }

    fn on_policy_failure(&mut self, error: &str) {
        let failures = self.state.record_policy_failure();
        let threshold = self.settings.policy_failure_alert_threshold.max(1);

        if failures % threshold == 0 {
            error!(
                failures,
                error = %error,
                "Policy unreadable, apps are not being blocked"
            );
            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::PolicyUnavailable {
                    consecutive_failures: failures,
                    error: error.to_string(),
                }));
        } else if failures == 1 {
            warn!(error = %error, "Failed to read policy, skipping cycle");
        } else {
            debug!(failures, error = %error, "Policy still unreadable");
        }
    }
}
