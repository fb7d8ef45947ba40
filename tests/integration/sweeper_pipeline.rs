//! Integration tests for the sweeper actor running against a live clock
//!
//! These tests verify that:
//! - A silent collector is detected by the periodic sweep
//! - Its generators move to a collector that keeps heartbeating
//! - Policy changes through the handle apply to the next sweep

use std::sync::Arc;
use std::time::Duration;

use collector_fleet::{
    CollectorStatus, FleetCoordinator, GeneratorSpec,
    actors::{SweepEvent, SweeperHandle},
    config::HeartbeatConfig,
    fleet::{AssignmentPolicy, PolicySwitch, TieBreak},
    storage::MemoryStore,
    util,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

fn fast_coordinator() -> Arc<FleetCoordinator> {
    Arc::new(FleetCoordinator::new(
        Arc::new(MemoryStore::new()),
        HeartbeatConfig::new(50, 50),
    ))
}

/// Heartbeat `name` every 20ms until aborted
fn keep_alive(coordinator: Arc<FleetCoordinator>, name: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let _ = coordinator.record_heartbeat(name, util::now_millis()).await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

/// Wait for the first sweep event that moved something
async fn next_change(rx: &mut broadcast::Receiver<SweepEvent>) -> SweepEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if !event.report.missed.is_empty() || !event.report.reassigned.is_empty() {
                return event;
            }
        }
    })
    .await
    .expect("sweep with changes within timeout")
}

#[tokio::test]
async fn test_silent_collector_detected_by_periodic_sweep() {
    let coordinator = fast_coordinator();
    let now = util::now_millis();
    coordinator.register_collector("alive", "1", now).await.unwrap();
    coordinator.register_collector("silent", "1", now).await.unwrap();
    coordinator
        .create_generator(
            GeneratorSpec::new("g1", &["silent", "alive"], true),
            now,
            AssignmentPolicy::FirstFit,
        )
        .await
        .unwrap();

    let heartbeat = keep_alive(coordinator.clone(), "alive");

    let (event_tx, mut event_rx) = broadcast::channel(64);
    let sweeper = SweeperHandle::spawn(
        coordinator.clone(),
        PolicySwitch::default(),
        Duration::from_millis(25),
        event_tx,
    );

    let event = next_change(&mut event_rx).await;

    assert_eq!(event.report.missed, vec!["silent".to_string()]);
    assert_eq!(event.report.reassigned.len(), 1);
    assert_eq!(event.report.reassigned[0].to.as_deref(), Some("alive"));

    assert_eq!(
        coordinator.get_collector("silent").await.unwrap().status,
        CollectorStatus::MissedHeartbeat
    );
    assert_eq!(
        coordinator.get_collector("alive").await.unwrap().status,
        CollectorStatus::Running
    );

    heartbeat.abort();
    sweeper.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_heartbeat_after_miss_restores_running() {
    let coordinator = fast_coordinator();
    coordinator
        .register_collector("c1", "1", util::now_millis())
        .await
        .unwrap();

    let (event_tx, mut event_rx) = broadcast::channel(64);
    let sweeper = SweeperHandle::spawn(
        coordinator.clone(),
        PolicySwitch::default(),
        Duration::from_millis(25),
        event_tx,
    );

    next_change(&mut event_rx).await;
    assert_eq!(
        coordinator.get_collector("c1").await.unwrap().status,
        CollectorStatus::MissedHeartbeat
    );

    let ack = coordinator
        .record_heartbeat("c1", util::now_millis())
        .await
        .unwrap();
    assert_eq!(ack.collector.status, CollectorStatus::Running);

    sweeper.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_policy_switch_applies_to_next_sweep() {
    let coordinator = fast_coordinator();
    let now = util::now_millis();
    for name in ["a", "b", "c"] {
        coordinator.register_collector(name, "1", now).await.unwrap();
    }
    for i in 0..4 {
        coordinator
            .create_generator(
                GeneratorSpec::new(format!("g{i}"), &["a", "b", "c"], true),
                now,
                AssignmentPolicy::FirstFit,
            )
            .await
            .unwrap();
    }

    let keep_b = keep_alive(coordinator.clone(), "b");
    let keep_c = keep_alive(coordinator.clone(), "c");

    let policy = PolicySwitch::new(false, TieBreak::FewestContenders);
    let (event_tx, _event_rx) = broadcast::channel(64);
    let sweeper = SweeperHandle::spawn(
        coordinator.clone(),
        policy.clone(),
        Duration::from_secs(3600),
        event_tx,
    );

    sweeper.set_load_balancing(true).await.unwrap();
    assert!(sweeper.get_stats().await.is_ok());
    assert!(policy.is_load_balancing());

    // let "a" go stale, then sweep on demand
    tokio::time::sleep(Duration::from_millis(150)).await;
    let report = sweeper.sweep_now().await.unwrap();

    assert_eq!(report.missed, vec!["a".to_string()]);
    assert_eq!(report.reassigned.len(), 4);

    let on_b = report
        .reassigned
        .iter()
        .filter(|r| r.to.as_deref() == Some("b"))
        .count();
    assert_eq!(on_b, 2, "least-loaded spreads the batch: {report:?}");

    keep_b.abort();
    keep_c.abort();
    sweeper.shutdown().await.unwrap();
}
