//! Concurrency tests for the coordinator
//!
//! These tests verify that:
//! - Creates, heartbeats, sweeps and status changes can interleave freely
//! - No generator ends up on a collector that is not Running
//! - A heartbeat racing a sweep is never lost
//! - A heartbeat racing a stop never resurrects the collector in the store

use std::sync::Arc;
use std::time::Duration;

use collector_fleet::{CollectorStatus, FleetCoordinator, GeneratorSpec, storage::FleetStore};
use futures::future::join_all;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_all_placed_once() {
    let coordinator = memory_coordinator();
    register_all(&coordinator, &["C1", "C2", "C3", "C4"], T0).await;

    let tasks = (0..64).map(|i| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .create_generator(
                    GeneratorSpec::new(format!("g{i:02}"), &["C1", "C2", "C3", "C4"], true),
                    T0,
                    LEAST_LOADED,
                )
                .await
        })
    });

    for result in join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }

    let generators = coordinator.list_generators().await;
    assert_eq!(generators.len(), 64);
    assert!(generators.iter().all(|g| g.current_collector.is_some()));
    assert_assignments_valid(&coordinator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_creates_race_to_one_winner() {
    let coordinator = memory_coordinator();
    register_all(&coordinator, &["C1"], T0).await;

    let tasks = (0..16).map(|_| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .create_generator(GeneratorSpec::new("same", &["C1"], true), T0, FIRST_FIT)
                .await
        })
    });

    let successes = join_all(tasks)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(coordinator.list_generators().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_racing_creates_settles_after_sweep() {
    let coordinator = memory_coordinator();
    register_all(&coordinator, &["C1", "C2"], T0).await;

    let creates = (0..32).map(|i| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .create_generator(
                    GeneratorSpec::new(format!("g{i:02}"), &["C1", "C2"], true),
                    T0,
                    FIRST_FIT,
                )
                .await
                .unwrap();
        })
    });
    let stop = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.stop_collector("C1", T0, FIRST_FIT).await })
    };

    join_all(creates).await;
    stop.await.unwrap().unwrap();

    // a create that read C1 before the stop landed is repaired here
    coordinator.sweep(T0 + 1, FIRST_FIT).await;

    assert_assignments_valid(&coordinator).await;
    for generator in coordinator.list_generators().await {
        assert_eq!(generator.current_collector.as_deref(), Some("C2"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_heartbeat_racing_sweep_is_never_lost() {
    for round in 0..20 {
        let coordinator = memory_coordinator();
        register_all(&coordinator, &["C1"], T0).await;

        let now = just_dead(T0);
        let sweep = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sweep(now, FIRST_FIT).await })
        };
        let heartbeat = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.record_heartbeat("C1", now).await })
        };

        sweep.await.unwrap();
        heartbeat.await.unwrap().unwrap();

        // heartbeat first: nothing to mark; mark first: the heartbeat heals it
        let collector = coordinator.get_collector("C1").await.unwrap();
        assert_eq!(collector.last_heartbeat, Some(now), "round {round}");
        assert_eq!(collector.status, CollectorStatus::Running, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sweeps_do_not_double_move() {
    let coordinator = memory_coordinator();
    register_all(&coordinator, &["C1", "C2", "C3"], T0).await;
    for i in 0..10 {
        create_active(&coordinator, &format!("g{i}"), &["C1", "C2", "C3"], T0, FIRST_FIT).await;
    }

    let now = just_dead(T0);
    coordinator.record_heartbeat("C2", now).await.unwrap();
    coordinator.record_heartbeat("C3", now).await.unwrap();

    let sweeps = (0..4).map(|_| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sweep(now, LEAST_LOADED).await })
    });

    let reports: Vec<_> = join_all(sweeps)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let missed: usize = reports.iter().map(|r| r.missed.len()).sum();
    let moved: usize = reports.iter().map(|r| r.reassigned.len()).sum();

    // exactly one sweep wins the transition and moves each generator once
    assert_eq!(missed, 1);
    assert_eq!(moved, 10);
    assert_assignments_valid(&coordinator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_is_not_overwritten_by_slow_heartbeat_write() {
    let store = Arc::new(GateStore::new());
    let coordinator = Arc::new(FleetCoordinator::new(store.clone(), test_heartbeat()));
    register_all(&coordinator, &["C1", "C2"], T0).await;

    let gate = store.hold_next_collector_write().await;

    let heartbeat = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.record_heartbeat("C1", T0 + 100).await })
    };
    store.wait_until_held().await;

    let stop = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.stop_collector("C1", T0 + 200, FIRST_FIT).await })
    };

    // the stop waits for the heartbeat's write to land first
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!stop.is_finished());

    drop(gate);
    heartbeat.await.unwrap().unwrap();
    stop.await.unwrap().unwrap();

    assert_eq!(
        coordinator.get_collector("C1").await.unwrap().status,
        CollectorStatus::Stopped
    );
    let stored = store.load_collectors().await.unwrap();
    let c1 = stored.iter().find(|c| c.name == "C1").unwrap();
    assert_eq!(c1.status, CollectorStatus::Stopped);

    // a restarted hub keeps the stopped collector out of placement
    let restarted = FleetCoordinator::new(store.clone(), test_heartbeat());
    restarted.restore().await.unwrap();
    assert_eq!(
        create_active(&restarted, "g", &["C1", "C2"], T0 + 300, FIRST_FIT)
            .await
            .as_deref(),
        Some("C2")
    );
}
