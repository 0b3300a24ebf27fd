//! Integration tests for blockaded
//!
//! These tests verify the end-to-end behavior of the service components:
//! configuration, the on-disk policy store, the enforcement monitor and its
//! controller, driven by the mock host.

use blockade_api::Schedule;
use blockade_config::parse_config;
use blockade_core::{
    AllowReason, CycleOutcome, EnforcementMonitor, MonitorController, MonitorSettings,
    StartOutcome,
};
use blockade_host_api::{ChannelTicks, HostAdapter, HostCapabilities, HostEvent, MockHost, Tick};
use blockade_store::{AuditEventType, PolicyStore, SqliteStore, StoreError};
use blockade_util::{DailyWindow, MinuteOfDay, MonotonicInstant, PackageId, database_path};
use chrono::{Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn open_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(database_path(dir.path())).unwrap())
}

fn monitor(
    store: Arc<dyn PolicyStore>,
    host: &Arc<MockHost>,
    settings: MonitorSettings,
) -> (EnforcementMonitor, mpsc::UnboundedReceiver<CycleOutcome>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let monitor =
        EnforcementMonitor::new(store, host.clone(), host.clone(), settings).with_outcome_sink(tx);
    (monitor, rx)
}

async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<CycleOutcome>) -> CycleOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a cycle")
        .expect("monitor dropped the outcome sink")
}

fn at(hour: u32, minute: u32) -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 4, hour, minute, 0)
        .single()
        .unwrap()
}

fn window(start: (u8, u8), end: (u8, u8)) -> Schedule {
    Schedule::Daily(DailyWindow::new(
        MinuteOfDay::from_hm(start.0, start.1).unwrap(),
        MinuteOfDay::from_hm(end.0, end.1).unwrap(),
    ))
}

#[tokio::test]
async fn test_blocked_app_interrupted_once_per_visit() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.add_blocked(&PackageId::new("com.x")).unwrap();

    let host = Arc::new(MockHost::new());
    host.script_foreground([Some("com.x"), Some("com.x"), Some("com.y")]);

    let (monitor, mut outcomes) = monitor(store.clone(), &host, MonitorSettings::default());
    let (tick_tx, ticks) = ChannelTicks::channel();
    let mut controller = MonitorController::new();
    assert_eq!(controller.start(monitor, Box::new(ticks)), StartOutcome::Started);

    for _ in 0..3 {
        tick_tx.send(Tick::Interval).unwrap();
    }

    assert!(matches!(next_outcome(&mut outcomes).await, CycleOutcome::Presented { .. }));
    assert!(matches!(next_outcome(&mut outcomes).await, CycleOutcome::Suppressed { .. }));
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        CycleOutcome::Idle {
            reason: AllowReason::NotBlocked,
            ..
        }
    ));

    assert!(controller.stop().await);
    assert_eq!(host.presentations(), vec![PackageId::new("com.x")]);

    let presented = store
        .get_recent_audits(10)
        .unwrap()
        .into_iter()
        .filter(|e| matches!(e.event, AuditEventType::InterstitialPresented { .. }))
        .count();
    assert_eq!(presented, 1);
}

#[tokio::test]
async fn test_policy_written_by_another_process_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let daemon_store = open_store(&dir);
    let cli_store = open_store(&dir);

    let host = Arc::new(MockHost::new());
    host.set_foreground(Some("com.x"));

    let (mut monitor, _outcomes) = monitor(daemon_store, &host, MonitorSettings::default());
    let now = at(12, 0);

    let outcome = monitor.run_cycle(Tick::Interval, now, MonotonicInstant::now()).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Idle {
            reason: AllowReason::NotBlocked,
            ..
        }
    ));

    cli_store.add_blocked(&PackageId::new("com.x")).unwrap();
    let outcome = monitor.run_cycle(Tick::Interval, now, MonotonicInstant::now()).await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));

    cli_store.set_enabled(false).unwrap();
    let outcome = monitor.run_cycle(Tick::Interval, now, MonotonicInstant::now()).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Idle {
            reason: AllowReason::Disabled,
            ..
        }
    ));
    assert_eq!(host.presentation_count(), 1);
}

#[tokio::test]
async fn test_overnight_schedule_from_store() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.add_blocked(&PackageId::new("com.x")).unwrap();
    store.set_schedule(window((22, 0), (6, 0))).unwrap();

    let host = Arc::new(MockHost::new());
    host.set_foreground(Some("com.x"));
    let (mut monitor, _outcomes) = monitor(store, &host, MonitorSettings::default());
    let now_mono = MonotonicInstant::now();

    let outcome = monitor.run_cycle(Tick::Interval, at(12, 0), now_mono).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Idle {
            reason: AllowReason::OutsideSchedule,
            ..
        }
    ));

    let outcome = monitor.run_cycle(Tick::Interval, at(23, 0), now_mono).await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));

    // Leaving the window re-arms; coming back after midnight presents again
    let outcome = monitor.run_cycle(Tick::Interval, at(7, 0), now_mono).await;
    assert!(matches!(outcome, CycleOutcome::Idle { .. }));
    let outcome = monitor.run_cycle(Tick::Interval, at(2, 0), now_mono).await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));

    assert_eq!(host.presentation_count(), 2);
}

#[tokio::test]
async fn test_failed_presentation_retried_and_detection_failure_survived() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.add_blocked(&PackageId::new("com.x")).unwrap();

    let host = Arc::new(MockHost::new());
    host.set_foreground(Some("com.x"));
    host.set_fail_present(true);

    let (mut monitor, _outcomes) = monitor(store.clone(), &host, MonitorSettings::default());
    let now = at(12, 0);
    let now_mono = MonotonicInstant::now();

    let outcome = monitor.run_cycle(Tick::Interval, now, now_mono).await;
    assert!(matches!(outcome, CycleOutcome::PresentationFailed { .. }));

    host.set_fail_present(false);
    let outcome = monitor.run_cycle(Tick::Interval, now, now_mono).await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));

    // An unknown foreground is not a visit elsewhere
    host.set_fail_detect(true);
    let outcome = monitor.run_cycle(Tick::Interval, now, now_mono).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Idle {
            package: None,
            reason: AllowReason::NoForeground,
        }
    ));

    host.set_fail_detect(false);
    let outcome = monitor.run_cycle(Tick::Interval, now, now_mono).await;
    assert!(matches!(outcome, CycleOutcome::Suppressed { .. }));
    assert_eq!(host.presentation_count(), 1);

    let audits: Vec<_> = store
        .get_recent_audits(10)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(audits
        .iter()
        .any(|e| matches!(e, AuditEventType::PresentationFailed { .. })));
}

#[tokio::test]
async fn test_config_drives_monitor_settings() {
    let config = parse_config(
        r#"
        config_version = 1

        [monitor]
        poll_interval_ms = 1000
        rearm_after_seconds = 30

        [presenter]
        command = ["notify-send", "{label} is blocked"]
        package_id = "notify-send"
        "#,
    )
    .unwrap();

    let store = Arc::new(SqliteStore::in_memory().unwrap().with_reserved(config.reserved()));
    assert!(matches!(
        store.add_blocked(&PackageId::new("notify-send")),
        Err(StoreError::ReservedPackage(_))
    ));
    store.add_blocked(&PackageId::new("com.x")).unwrap();

    let settings = MonitorSettings {
        rearm_after: config.monitor.rearm_after,
        present_timeout: config.monitor.present_timeout,
        policy_failure_alert_threshold: config.monitor.policy_failure_alert_threshold,
    };

    let host = Arc::new(MockHost::new());
    host.set_foreground(Some("com.x"));
    let (mut monitor, _outcomes) = monitor(store, &host, settings);
    let now = at(12, 0);
    let start = MonotonicInstant::now();

    let outcome = monitor.run_cycle(Tick::Interval, now, start).await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));

    let outcome = monitor
        .run_cycle(Tick::Interval, now, start + Duration::from_secs(10))
        .await;
    assert!(matches!(outcome, CycleOutcome::Suppressed { .. }));

    let outcome = monitor
        .run_cycle(Tick::Interval, now, start + Duration::from_secs(31))
        .await;
    assert!(matches!(outcome, CycleOutcome::Presented { .. }));
    assert_eq!(host.presentation_count(), 2);
}

#[tokio::test]
async fn test_capability_drives_start_and_stop() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.add_blocked(&PackageId::new("com.x")).unwrap();

    let host = Arc::new(MockHost::new().with_capabilities(HostCapabilities {
        can_report_capability: true,
        can_observe_foreground_changes: true,
        ..HostCapabilities::minimal()
    }));
    let mut events = host.subscribe();
    let mut controller = MonitorController::new();
    let mut tick_tx: Option<mpsc::UnboundedSender<Tick>> = None;
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();

    host.grant_capability();
    host.grant_capability();
    host.emit_foreground_change(Some("com.x"));
    host.revoke_capability();
    host.emit_foreground_change(Some("com.x"));

    let mut starts = 0;
    for _ in 0..5 {
        let event = events.recv().await.unwrap();
        match event {
            HostEvent::CapabilityGranted => {
                let monitor = EnforcementMonitor::new(
                    store.clone(),
                    host.clone(),
                    host.clone(),
                    MonitorSettings::default(),
                )
                .with_outcome_sink(outcome_tx.clone());
                let (tx, ticks) = ChannelTicks::channel();
                if controller.start(monitor, Box::new(ticks)) == StartOutcome::Started {
                    starts += 1;
                    tick_tx = Some(tx);
                }
            }
            HostEvent::CapabilityRevoked => {
                tick_tx = None;
                assert!(controller.stop().await);
                assert!(!controller.is_running());
            }
            HostEvent::ForegroundChanged { package } => {
                if let Some(tx) = &tick_tx {
                    tx.send(Tick::ForegroundChanged { package }).unwrap();
                    assert!(matches!(
                        next_outcome(&mut outcomes).await,
                        CycleOutcome::Presented { .. }
                    ));
                }
            }
        }
    }

    assert_eq!(starts, 1);
    assert!(tick_tx.is_none());
    assert_eq!(host.presentation_count(), 1);
    assert!(outcomes.try_recv().is_err());
}
