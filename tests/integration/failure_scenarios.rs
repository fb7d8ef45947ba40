//! Failure tests for the coordinator
//!
//! These tests verify that store failures are handled gracefully:
//! - A failed write during a batch does not abort the batch
//! - The failed generator is left unassigned and retried by the next sweep
//! - Failed creates and updates leave the in-memory state untouched
//! - Collector bookkeeping keeps working while the store is down

use assert_matches::assert_matches;
use collector_fleet::{FleetError, GeneratorPatch, GeneratorSpec, storage::StorageError};

use crate::helpers::*;

#[tokio::test]
async fn test_failed_write_does_not_abort_batch() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1", "C2"], T0).await;
    for name in ["a", "b", "c"] {
        create_active(&coordinator, name, &["C1", "C2"], T0, FIRST_FIT).await;
    }

    store.fail_writes(true);
    let report = coordinator.stop_collector("C1", T0, FIRST_FIT).await.unwrap();

    // every generator was attempted, every write failed
    assert!(report.reassigned.is_empty());
    let failed: Vec<&str> = report.failures.iter().map(|f| f.generator.as_str()).collect();
    assert_eq!(failed, vec!["a", "b", "c"]);

    // memory never points at the stopped collector
    for generator in coordinator.list_generators().await {
        assert_eq!(generator.current_collector, None, "{}", generator.name);
    }
}

#[tokio::test]
async fn test_failed_generators_retried_by_next_sweep() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1", "C2"], T0).await;
    create_active(&coordinator, "a", &["C1", "C2"], T0, FIRST_FIT).await;
    create_active(&coordinator, "b", &["C1", "C2"], T0, FIRST_FIT).await;

    store.fail_writes(true);
    let report = coordinator.stop_collector("C1", T0, FIRST_FIT).await.unwrap();
    assert_eq!(report.failures.len(), 2);

    // still failing: the sweep retries and fails again, nothing is lost
    let sweep = coordinator.sweep(T0 + 10, FIRST_FIT).await;
    assert_eq!(sweep.failures.len(), 2);
    assert_eq!(coordinator.summary().await.unassigned_generators, 2);

    store.fail_writes(false);
    let sweep = coordinator.sweep(T0 + 20, FIRST_FIT).await;

    assert!(sweep.failures.is_empty());
    assert_eq!(sweep.reassigned.len(), 2);
    assert!(sweep.reassigned.iter().all(|r| r.to.as_deref() == Some("C2")));
    assert_assignments_valid(&coordinator).await;
}

#[tokio::test]
async fn test_sweep_marks_collectors_while_store_is_down() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1", "C2"], T0).await;
    create_active(&coordinator, "g", &["C1", "C2"], T0, FIRST_FIT).await;

    store.fail_writes(true);
    let now = just_dead(T0);
    coordinator.record_heartbeat("C2", now).await.unwrap();

    let report = coordinator.sweep(now, FIRST_FIT).await;

    // the status change happens in memory even though it cannot be persisted
    assert_eq!(report.missed, vec!["C1".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(coordinator.get_generator("g").await.unwrap().current_collector, None);
}

#[tokio::test]
async fn test_failed_create_leaves_no_generator() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1"], T0).await;

    store.fail_writes(true);
    let result = coordinator
        .create_generator(GeneratorSpec::new("g", &["C1"], true), T0, FIRST_FIT)
        .await;

    assert_matches!(result, Err(FleetError::Storage(StorageError::Unavailable(_))));
    assert!(coordinator.get_generator("g").await.is_err());

    // the same name can be created once the store is back
    store.fail_writes(false);
    let assigned = create_active(&coordinator, "g", &["C1"], T0, FIRST_FIT).await;
    assert_eq!(assigned.as_deref(), Some("C1"));
}

#[tokio::test]
async fn test_failed_update_keeps_previous_record() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1", "C2"], T0).await;
    create_active(&coordinator, "g", &["C1", "C2"], T0, FIRST_FIT).await;
    let before = coordinator.get_generator("g").await.unwrap();

    store.fail_writes(true);
    let result = coordinator
        .update_generator(
            "g",
            GeneratorPatch {
                possible_collectors: Some(vec!["C2".into()]),
                is_active: None,
            },
            T0,
            FIRST_FIT,
        )
        .await;

    assert_matches!(result, Err(FleetError::Storage(_)));
    assert_eq!(coordinator.get_generator("g").await.unwrap(), before);
}

#[tokio::test]
async fn test_heartbeats_accepted_while_store_is_down() {
    let (coordinator, store) = flaky_coordinator();
    register_all(&coordinator, &["C1"], T0).await;
    create_active(&coordinator, "g", &["C1"], T0, FIRST_FIT).await;

    store.fail_writes(true);
    let ack = coordinator.record_heartbeat("C1", T0 + 1_000).await.unwrap();

    assert_eq!(ack.collector.last_heartbeat, Some(T0 + 1_000));
    assert_eq!(ack.generators, vec!["g".to_string()]);
}

#[tokio::test]
async fn test_unknown_collector_heartbeat_is_not_found() {
    let coordinator = memory_coordinator();

    let result = coordinator.record_heartbeat("ghost", T0).await;
    assert_matches!(result, Err(FleetError::NotFound(_)));

    let result = coordinator.stop_collector("ghost", T0, FIRST_FIT).await;
    assert_matches!(result, Err(FleetError::NotFound(_)));
}
