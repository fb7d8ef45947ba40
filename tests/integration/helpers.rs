//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard, Notify};
use collector_fleet::{
    AssignmentPolicy, Collector, FleetCoordinator, Generator, GeneratorSpec, Millis, TieBreak,
    config::HeartbeatConfig,
    storage::{FleetStore, HealthStatus, MemoryStore, StorageError, StorageResult},
};

/// Start of the test clock
pub const T0: Millis = 1_700_000_000_000;

/// 1s interval + 500ms tolerance: a collector is dead 1501ms after its last
/// heartbeat
pub fn test_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig::new(1_000, 500)
}

/// First moment at which a heartbeat sent at `last` counts as missed
pub fn just_dead(last: Millis) -> Millis {
    let heartbeat = test_heartbeat();
    last + (heartbeat.interval_ms + heartbeat.tolerance_ms) as Millis + 1
}

pub const FIRST_FIT: AssignmentPolicy = AssignmentPolicy::FirstFit;
pub const LEAST_LOADED: AssignmentPolicy = AssignmentPolicy::LeastLoaded(TieBreak::FewestContenders);

/// Store wrapper whose writes can be switched to fail
///
/// Reads always succeed. Failing writes report `Unavailable`.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FleetStore for FlakyStore {
    async fn upsert_collector(&self, collector: &Collector) -> StorageResult<()> {
        self.check()?;
        self.inner.upsert_collector(collector).await
    }

    async fn load_collectors(&self) -> StorageResult<Vec<Collector>> {
        self.inner.load_collectors().await
    }

    async fn upsert_generator(&self, generator: &Generator) -> StorageResult<()> {
        self.check()?;
        self.inner.upsert_generator(generator).await
    }

    async fn set_current_collector(
        &self,
        generator: &str,
        collector: Option<&str>,
    ) -> StorageResult<()> {
        self.check()?;
        self.inner.set_current_collector(generator, collector).await
    }

    async fn load_generators(&self) -> StorageResult<Vec<Generator>> {
        self.inner.load_generators().await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Store wrapper that can hold one collector write at a gate
///
/// `hold_next_collector_write` arms the gate; the next `upsert_collector`
/// signals `wait_until_held` and then blocks until the returned guard is
/// dropped.
pub struct GateStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    gate: Mutex<()>,
}

impl GateStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Mutex::new(()),
        }
    }

    pub async fn hold_next_collector_write(&self) -> MutexGuard<'_, ()> {
        let guard = self.gate.lock().await;
        self.armed.store(true, Ordering::SeqCst);
        guard
    }

    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl FleetStore for GateStore {
    async fn upsert_collector(&self, collector: &Collector) -> StorageResult<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            let _open = self.gate.lock().await;
        }
        self.inner.upsert_collector(collector).await
    }

    async fn load_collectors(&self) -> StorageResult<Vec<Collector>> {
        self.inner.load_collectors().await
    }

    async fn upsert_generator(&self, generator: &Generator) -> StorageResult<()> {
        self.inner.upsert_generator(generator).await
    }

    async fn set_current_collector(
        &self,
        generator: &str,
        collector: Option<&str>,
    ) -> StorageResult<()> {
        self.inner.set_current_collector(generator, collector).await
    }

    async fn load_generators(&self) -> StorageResult<Vec<Generator>> {
        self.inner.load_generators().await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Coordinator over a fresh in-memory store
pub fn memory_coordinator() -> Arc<FleetCoordinator> {
    Arc::new(FleetCoordinator::new(
        Arc::new(MemoryStore::new()),
        test_heartbeat(),
    ))
}

/// Coordinator over a store whose writes can be broken on demand
pub fn flaky_coordinator() -> (Arc<FleetCoordinator>, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new());
    let coordinator = Arc::new(FleetCoordinator::new(store.clone(), test_heartbeat()));
    (coordinator, store)
}

/// Register `names` at `now`, in order (ids follow the order)
pub async fn register_all(coordinator: &FleetCoordinator, names: &[&str], now: Millis) {
    for name in names {
        coordinator
            .register_collector(name, "test", now)
            .await
            .unwrap();
    }
}

/// Create an active generator and return its assignment
pub async fn create_active(
    coordinator: &FleetCoordinator,
    name: &str,
    possible: &[&str],
    now: Millis,
    policy: AssignmentPolicy,
) -> Option<String> {
    coordinator
        .create_generator(GeneratorSpec::new(name, possible, true), now, policy)
        .await
        .unwrap()
        .current_collector
}

/// Every assigned generator points at a Running, eligible, non-deleted
/// collector, and only active generators are assigned
pub async fn assert_assignments_valid(coordinator: &FleetCoordinator) {
    let collectors = coordinator.list_collectors().await;

    for generator in coordinator.list_generators().await {
        let Some(current) = &generator.current_collector else {
            continue;
        };

        assert!(generator.is_active, "{} is inactive but assigned", generator.name);
        assert!(
            generator.is_eligible(current),
            "{} assigned to ineligible {current}",
            generator.name
        );

        let collector = collectors
            .iter()
            .find(|c| &c.name == current)
            .unwrap_or_else(|| panic!("{} assigned to unknown {current}", generator.name));
        assert!(collector.is_running(), "{} assigned to {collector:?}", generator.name);
    }
}
