//! Collector registry
//!
//! Every operation touches a single collector inside one short critical
//! section of the map lock (no `.await` while it is held), so a heartbeat and
//! a status transition for the same collector are serialised and each
//! transition is a compare-and-set against the current record.
//!
//! Callers that mirror a record to the store hold the collector's writer
//! lock from the transition until the write completes, so the store sees
//! the writes for one collector in the order the registry applied them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::Millis;

use super::error::{FleetError, FleetResult};
use super::model::{Collector, CollectorStatus};

/// Exclusive right to change and persist one collector
pub type CollectorWriteGuard = OwnedMutexGuard<()>;

/// Record of all collectors known to the hub
pub struct CollectorRegistry {
    collectors: RwLock<HashMap<String, Collector>>,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_id: AtomicU64,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self {
            collectors: RwLock::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Acquire the writer lock of a collector (created on first use)
    pub async fn lock(&self, name: &str) -> CollectorWriteGuard {
        let writer = {
            let mut writers = self.writers.lock().await;
            writers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        writer.lock_owned().await
    }

    /// Load previously persisted collectors (including soft-deleted ones)
    pub async fn restore(&self, collectors: Vec<Collector>) {
        let mut map = self.collectors.write().await;
        for collector in collectors {
            self.next_id.fetch_max(collector.id + 1, Ordering::SeqCst);
            map.insert(collector.name.clone(), collector);
        }
    }

    /// Register a collector, or restart an existing one
    ///
    /// A new collector starts Running with `last_heartbeat = now`. Registering
    /// a known name brings it back to Running, refreshes its version and
    /// counts as a heartbeat. A soft-deleted name stays deleted and is
    /// rejected with `Deleted`.
    pub async fn register(&self, name: &str, version: &str, now: Millis) -> FleetResult<Collector> {
        if name.trim().is_empty() {
            return Err(FleetError::Validation(
                "collector name must not be empty".to_string(),
            ));
        }

        let mut map = self.collectors.write().await;

        if let Some(existing) = map.get_mut(name) {
            if existing.deleted {
                warn!("rejected registration of deleted collector {name}");
                return Err(FleetError::collector_deleted(name));
            }
            existing.status = CollectorStatus::Running;
            existing.version = version.to_string();
            existing.last_heartbeat = Some(existing.last_heartbeat.map_or(now, |last| last.max(now)));
            info!("collector {name} re-registered (id={})", existing.id);
            return Ok(existing.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let collector = Collector::new(id, name, version, now);
        map.insert(name.to_string(), collector.clone());

        info!("registered collector {name} as id={id}");
        Ok(collector)
    }

    /// Ingest a heartbeat
    ///
    /// `last_heartbeat` only moves forward. A collector in MissedHeartbeat
    /// goes back to Running; Paused and Stopped collectors keep their status.
    pub async fn record_heartbeat(&self, name: &str, timestamp: Millis) -> FleetResult<Collector> {
        let mut map = self.collectors.write().await;

        let collector = map
            .get_mut(name)
            .filter(|c| !c.deleted)
            .ok_or_else(|| FleetError::collector_not_found(name))?;

        collector.last_heartbeat = Some(
            collector
                .last_heartbeat
                .map_or(timestamp, |last| last.max(timestamp)),
        );

        if collector.status == CollectorStatus::MissedHeartbeat {
            collector.status = CollectorStatus::Running;
            info!("collector {name} recovered from missed heartbeat");
        }

        debug!("heartbeat from {name} at {timestamp}");
        Ok(collector.clone())
    }

    /// Mark a collector as MissedHeartbeat
    ///
    /// Transitions only if the collector is still Running and its
    /// `last_heartbeat` is still the value the sweep observed. A heartbeat
    /// that arrived after the sweep took its snapshot therefore wins. Returns
    /// the record after the transition, or `None` if nothing changed.
    pub async fn mark_missed_heartbeat(
        &self,
        name: &str,
        observed_heartbeat: Option<Millis>,
    ) -> Option<Collector> {
        let mut map = self.collectors.write().await;

        let collector = map.get_mut(name)?;

        if !collector.is_running() || collector.last_heartbeat != observed_heartbeat {
            return None;
        }

        collector.status = CollectorStatus::MissedHeartbeat;
        warn!(
            "collector {name} missed its heartbeat (last seen: {:?})",
            collector.last_heartbeat
        );
        Some(collector.clone())
    }

    /// Stop a collector (always allowed)
    pub async fn stop(&self, name: &str) -> FleetResult<Collector> {
        self.transition(name, |collector| {
            collector.status = CollectorStatus::Stopped;
            Ok(())
        })
        .await
    }

    /// Pause a collector; a stopped collector has to be resumed first
    pub async fn pause(&self, name: &str) -> FleetResult<Collector> {
        self.transition(name, |collector| {
            if collector.status == CollectorStatus::Stopped {
                return Err(FleetError::Validation(format!(
                    "collector '{}' is stopped and cannot be paused",
                    collector.name
                )));
            }
            collector.status = CollectorStatus::Paused;
            Ok(())
        })
        .await
    }

    /// Bring a paused or stopped collector back to Running
    ///
    /// Counts as a heartbeat at `now`. Running and MissedHeartbeat collectors
    /// are left as they are: only a real heartbeat heals a missed one.
    pub async fn resume(&self, name: &str, now: Millis) -> FleetResult<Collector> {
        self.transition(name, |collector| {
            if matches!(
                collector.status,
                CollectorStatus::Paused | CollectorStatus::Stopped
            ) {
                collector.status = CollectorStatus::Running;
                collector.last_heartbeat =
                    Some(collector.last_heartbeat.map_or(now, |last| last.max(now)));
            }
            Ok(())
        })
        .await
    }

    /// Soft-delete a collector: stopped, hidden, never assignable
    pub async fn soft_delete(&self, name: &str) -> FleetResult<Collector> {
        self.transition(name, |collector| {
            collector.status = CollectorStatus::Stopped;
            collector.deleted = true;
            Ok(())
        })
        .await
    }

    async fn transition<F>(&self, name: &str, apply: F) -> FleetResult<Collector>
    where
        F: FnOnce(&mut Collector) -> FleetResult<()>,
    {
        let mut map = self.collectors.write().await;

        let collector = map
            .get_mut(name)
            .filter(|c| !c.deleted)
            .ok_or_else(|| FleetError::collector_not_found(name))?;

        let previous = collector.status;
        apply(collector)?;

        if previous != collector.status {
            info!("collector {name}: {previous} -> {}", collector.status);
        }

        Ok(collector.clone())
    }

    /// Get a collector by name (soft-deleted collectors are hidden)
    pub async fn get(&self, name: &str) -> Option<Collector> {
        self.collectors
            .read()
            .await
            .get(name)
            .filter(|c| !c.deleted)
            .cloned()
    }

    /// Get several collectors, in the order requested; unknown names are skipped
    pub async fn list_by_ids(&self, names: &[String]) -> Vec<Collector> {
        let map = self.collectors.read().await;
        names
            .iter()
            .filter_map(|name| map.get(name))
            .filter(|c| !c.deleted)
            .cloned()
            .collect()
    }

    /// All visible collectors, ordered by name
    pub async fn list(&self) -> Vec<Collector> {
        let mut collectors: Vec<Collector> = self
            .collectors
            .read()
            .await
            .values()
            .filter(|c| !c.deleted)
            .cloned()
            .collect();
        collectors.sort_by(|a, b| a.name.cmp(&b.name));
        collectors
    }

    /// Point-in-time copy of all visible collectors, keyed by name
    pub async fn snapshot(&self) -> HashMap<String, Collector> {
        self.collectors
            .read()
            .await
            .iter()
            .filter(|(_, c)| !c.deleted)
            .map(|(name, c)| (name.clone(), c.clone()))
            .collect()
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
