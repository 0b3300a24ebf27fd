//! blockaded - The blockade background service
//!
//! This is the main entry point for the blockaded service.
//! It wires together all the components:
//! - Configuration loading
//! - Policy store initialization
//! - Linux host adapter (sway foreground detection, desktop entries)
//! - Interstitial presenter
//! - Enforcement monitor, started and stopped as the host capability changes

use anyhow::{Context, Result};
use clap::Parser;
use blockade_config::{Config, TriggerMode, load_config, load_config_or_default};
use blockade_core::{EnforcementMonitor, MonitorController, MonitorSettings, StartOutcome};
use blockade_host_api::{ChannelTicks, HostAdapter, HostEvent, IntervalTicks, Tick, TickSource};
use blockade_host_linux::{CommandPresenter, DEFAULT_CAPABILITY_CHECK_INTERVAL, LinuxHost};
use blockade_store::{AuditEvent, AuditEventType, PolicyStore, SqliteStore};
use blockade_util::{config_path_without_env, database_path};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// blockaded - Interrupts blocked apps when they come to the foreground
#[derive(Parser, Debug)]
#[command(name = "blockaded")]
#[command(about = "Interrupts blocked apps when they come to the foreground", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/blockade/config.toml)
    #[arg(short, long, env = "BLOCKADE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override (or set BLOCKADE_DATA_DIR env var)
    #[arg(short, long, env = "BLOCKADE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    config: Config,
    store: Arc<dyn PolicyStore>,
    host: Arc<LinuxHost>,
    presenter: Arc<CommandPresenter>,
    controller: MonitorController,

    /// Feeds focus changes to the running monitor in event mode
    tick_tx: Option<mpsc::UnboundedSender<Tick>>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let config = match &args.config {
            Some(path) => load_config(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => {
                let path = config_path_without_env();
                load_config_or_default(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?
            }
        };

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        // Initialize store
        let db_path = database_path(&data_dir);
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?
            .with_reserved(config.reserved());
        let store: Arc<dyn PolicyStore> = Arc::new(store);

        info!(
            db_path = %db_path.display(),
            reserved = config.reserved().len(),
            "Store initialized"
        );

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        // Initialize host adapter and presenter
        let host = Arc::new(LinuxHost::new());
        let presenter = Arc::new(
            CommandPresenter::new(config.presenter.command.clone())
                .with_registry(host.registry()),
        );

        info!(
            trigger = config.monitor.trigger.as_str(),
            poll_interval_ms = config.monitor.poll_interval.as_millis() as u64,
            presenter = %config.presenter.command.join(" "),
            "Service configured"
        );

        Ok(Self {
            config,
            store,
            host,
            presenter,
            controller: MonitorController::new(),
            tick_tx: None,
        })
    }

    fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            rearm_after: self.config.monitor.rearm_after,
            present_timeout: self.config.monitor.present_timeout,
            policy_failure_alert_threshold: self.config.monitor.policy_failure_alert_threshold,
        }
    }

    fn start_monitor(&mut self) {
        if self.controller.is_running() {
            return;
        }

        let monitor = EnforcementMonitor::new(
            self.store.clone(),
            self.host.clone(),
            self.presenter.clone(),
            self.monitor_settings(),
        );

        let trigger = self.config.monitor.trigger;
        let ticks: Box<dyn TickSource> = match trigger {
            TriggerMode::Polling => Box::new(IntervalTicks::new(self.config.monitor.poll_interval)),
            TriggerMode::Event => {
                let (tx, ticks) = ChannelTicks::channel();
                // Check whatever is already in front right away
                let _ = tx.send(Tick::Interval);
                self.tick_tx = Some(tx);
                Box::new(ticks)
            }
        };

        if self.controller.start(monitor, ticks) == StartOutcome::Started {
            self.audit(AuditEventType::MonitorStarted {
                trigger: trigger.as_str().to_string(),
            });
        }
    }

    async fn stop_monitor(&mut self, reason: &str) {
        self.tick_tx = None;
        if self.controller.stop().await {
            self.audit(AuditEventType::MonitorStopped {
                reason: reason.to_string(),
            });
        }
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit record");
        }
    }

    async fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::CapabilityGranted => {
                info!("Foreground detection available, starting monitor");
                self.start_monitor();
            }
            HostEvent::CapabilityRevoked => {
                info!("Foreground detection lost, stopping monitor");
                self.stop_monitor("capability revoked").await;
            }
            HostEvent::ForegroundChanged { package } => {
                let Some(tx) = &self.tick_tx else {
                    return;
                };
                debug!(package = ?package, "Forwarding focus change");
                if tx.send(Tick::ForegroundChanged { package }).is_err() {
                    self.tick_tx = None;
                }
            }
        }
    }

    async fn run(mut self) -> Result<()> {
        let mut host_events = self.host.subscribe();

        let capabilities = self.host.capabilities().clone();
        let mut watchers = Vec::new();
        if capabilities.can_report_capability {
            watchers.push(
                self.host
                    .start_capability_watcher(DEFAULT_CAPABILITY_CHECK_INTERVAL),
            );
        } else {
            self.start_monitor();
        }
        if self.config.monitor.trigger == TriggerMode::Event
            && capabilities.can_observe_foreground_changes
        {
            watchers.push(self.host.start_focus_watcher());
        }

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Sent by sway on exit
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(host_event) = host_events.recv() => {
                    self.handle_host_event(host_event).await;
                }
            }
        }

        // Graceful shutdown
        info!("Shutting down blockaded");

        self.stop_monitor("shutdown").await;
        for watcher in watchers {
            watcher.abort();
        }
        self.presenter.dismiss();

        self.audit(AuditEventType::ServiceStopped);

        info!("Shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "blockaded starting");

    if blockade_util::is_mock_time_active() {
        warn!(now = %blockade_util::now(), "Mock time is active");
    }

    let service = Service::new(&args)?;
    service.run().await
}
