//! Reassignment coordinator
//!
//! The explicit entry points that change which collector runs a generator:
//!
//! | trigger                        | effect                                        |
//! |--------------------------------|-----------------------------------------------|
//! | `create_generator`             | initial placement                             |
//! | `update_generator`             | re-placement (kept if still valid)            |
//! | `stop` / `pause` / `delete`    | `on_collector_died` for that collector        |
//! | `sweep`                        | mark stale collectors, move their generators, |
//! |                                | then repair anything still unplaced           |
//!
//! There is no global lock across a pass. Collector transitions are atomic
//! per collector inside the registry and are mirrored to the store under the
//! collector's writer lock. Every generator write happens
//! under that generator's own writer lock, re-reading the record first so a
//! concurrent update always wins over a stale batch decision.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    Millis,
    config::HeartbeatConfig,
    monitors::liveness,
    storage::FleetStore,
};

use super::assignment::{AssignmentPolicy, FleetSnapshot, pick_collector};
use super::error::{FleetError, FleetResult};
use super::generators::GeneratorTable;
use super::model::{
    Collector, Generator, GeneratorPatch, GeneratorSpec, dedup_preserving_order,
};
use super::registry::CollectorRegistry;

/// Reply to a heartbeat: the collector record and the work assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub collector: Collector,

    /// Names of the generators currently assigned to this collector, ascending
    pub generators: Vec<String>,
}

/// A change of `current_collector` for one generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub generator: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A generator whose new assignment could not be persisted
///
/// The generator is left unassigned in memory and picked up again by the
/// next sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentFailure {
    pub generator: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentReport {
    pub reassigned: Vec<Reassignment>,
    pub failures: Vec<ReassignmentFailure>,
}

impl ReassignmentReport {
    pub fn merge(&mut self, other: ReassignmentReport) {
        self.reassigned.extend(other.reassigned);
        self.failures.extend(other.failures);
    }

    pub fn is_empty(&self) -> bool {
        self.reassigned.is_empty() && self.failures.is_empty()
    }
}

/// Outcome of one liveness sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Time the sweep evaluated liveness at
    pub now: Millis,

    /// Collectors that transitioned to MissedHeartbeat in this sweep
    pub missed: Vec<String>,

    pub reassigned: Vec<Reassignment>,
    pub failures: Vec<ReassignmentFailure>,
}

/// Counts for status endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub collectors: usize,
    pub running_collectors: usize,
    pub generators: usize,
    pub active_generators: usize,
    pub unassigned_generators: usize,
}

pub struct FleetCoordinator {
    registry: CollectorRegistry,
    generators: GeneratorTable,
    store: Arc<dyn FleetStore>,
    heartbeat: HeartbeatConfig,
}

impl FleetCoordinator {
    pub fn new(store: Arc<dyn FleetStore>, heartbeat: HeartbeatConfig) -> Self {
        Self {
            registry: CollectorRegistry::new(),
            generators: GeneratorTable::new(),
            store,
            heartbeat,
        }
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat
    }

    pub fn store(&self) -> &Arc<dyn FleetStore> {
        &self.store
    }

    /// Reload collectors and generators from the store
    ///
    /// Persisted assignments that are no longer acceptable (collector gone,
    /// deleted, not Running, no longer eligible, or generator inactive) are
    /// cleared. Liveness is not evaluated here: collectors get one sweep
    /// interval to check in after a restart. Returns the number of cleared
    /// assignments.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> FleetResult<usize> {
        let collectors = self.store.load_collectors().await?;
        let generators = self.store.load_generators().await?;

        info!(
            "restoring {} collectors and {} generators",
            collectors.len(),
            generators.len()
        );

        self.registry.restore(collectors).await;
        let live = self.registry.snapshot().await;

        let mut cleared = 0;
        for mut generator in generators {
            let keep = generator.is_active
                && generator.current_collector.as_deref().is_some_and(|current| {
                    generator.is_eligible(current)
                        && live.get(current).is_some_and(Collector::is_running)
                });

            if generator.current_collector.is_some() && !keep {
                debug!(
                    "clearing stale assignment {} -> {:?}",
                    generator.name, generator.current_collector
                );
                self.store
                    .set_current_collector(&generator.name, None)
                    .await?;
                generator.current_collector = None;
                cleared += 1;
            }

            self.generators.put(generator).await;
        }

        if cleared > 0 {
            info!("cleared {cleared} stale assignments during restore");
        }

        Ok(cleared)
    }

    // ------------------------------------------------------------------------
    // Collectors
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn register_collector(
        &self,
        name: &str,
        version: &str,
        now: Millis,
    ) -> FleetResult<Collector> {
        let _guard = self.registry.lock(name).await;
        let collector = self.registry.register(name, version, now).await?;
        self.persist_collector(&collector).await;
        Ok(collector)
    }

    /// Ingest a heartbeat and tell the collector what it should be running
    #[instrument(skip(self), level = "debug")]
    pub async fn record_heartbeat(&self, name: &str, timestamp: Millis) -> FleetResult<HeartbeatAck> {
        let collector = {
            let _guard = self.registry.lock(name).await;
            let collector = self.registry.record_heartbeat(name, timestamp).await?;
            self.persist_collector(&collector).await;
            collector
        };

        let generators = self.generators.assigned_to(name).await;
        Ok(HeartbeatAck {
            collector,
            generators,
        })
    }

    #[instrument(skip(self))]
    pub async fn stop_collector(
        &self,
        name: &str,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> FleetResult<ReassignmentReport> {
        {
            let _guard = self.registry.lock(name).await;
            let collector = self.registry.stop(name).await?;
            self.persist_collector(&collector).await;
        }
        Ok(self.on_collector_died(name, now, policy).await)
    }

    #[instrument(skip(self))]
    pub async fn pause_collector(
        &self,
        name: &str,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> FleetResult<ReassignmentReport> {
        {
            let _guard = self.registry.lock(name).await;
            let collector = self.registry.pause(name).await?;
            self.persist_collector(&collector).await;
        }
        Ok(self.on_collector_died(name, now, policy).await)
    }

    /// Resume a paused or stopped collector
    ///
    /// Nothing moves back eagerly; orphaned generators are picked up by the
    /// next sweep.
    #[instrument(skip(self))]
    pub async fn resume_collector(&self, name: &str, now: Millis) -> FleetResult<Collector> {
        let _guard = self.registry.lock(name).await;
        let collector = self.registry.resume(name, now).await?;
        self.persist_collector(&collector).await;
        Ok(collector)
    }

    #[instrument(skip(self))]
    pub async fn delete_collector(
        &self,
        name: &str,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> FleetResult<ReassignmentReport> {
        {
            let _guard = self.registry.lock(name).await;
            let collector = self.registry.soft_delete(name).await?;
            self.persist_collector(&collector).await;
        }
        Ok(self.on_collector_died(name, now, policy).await)
    }

    pub async fn get_collector(&self, name: &str) -> FleetResult<Collector> {
        self.registry
            .get(name)
            .await
            .ok_or_else(|| FleetError::collector_not_found(name))
    }

    pub async fn list_collectors(&self) -> Vec<Collector> {
        self.registry.list().await
    }

    // ------------------------------------------------------------------------
    // Generators
    // ------------------------------------------------------------------------

    /// Create a generator and attempt its initial placement
    ///
    /// No alive eligible collector is not an error: the generator is stored
    /// unassigned and the sweep keeps retrying it.
    #[instrument(skip(self, spec), fields(generator = %spec.name))]
    pub async fn create_generator(
        &self,
        spec: GeneratorSpec,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> FleetResult<Generator> {
        if spec.name.trim().is_empty() {
            return Err(FleetError::Validation(
                "generator name must not be empty".to_string(),
            ));
        }

        let _guard = self.generators.lock(&spec.name).await;

        if self.generators.contains(&spec.name).await {
            return Err(FleetError::Validation(format!(
                "generator '{}' already exists",
                spec.name
            )));
        }

        let possible_collectors = dedup_preserving_order(spec.possible_collectors);
        self.validate_collectors(spec.is_active, &possible_collectors)
            .await?;

        let mut generator = Generator {
            name: spec.name,
            is_active: spec.is_active,
            possible_collectors,
            current_collector: None,
        };

        if generator.is_active {
            let snapshot = self.snapshot(now).await;
            generator.current_collector = pick_collector(&generator, &snapshot, policy);
        }

        self.store.upsert_generator(&generator).await?;
        self.generators.put(generator.clone()).await;

        info!(
            "created generator {} -> {:?}",
            generator.name, generator.current_collector
        );
        Ok(generator)
    }

    /// Apply a patch and re-place the generator
    ///
    /// An inactive generator always ends up unassigned. An active one keeps
    /// its collector while that is still eligible and assignable.
    #[instrument(skip(self, patch))]
    pub async fn update_generator(
        &self,
        name: &str,
        patch: GeneratorPatch,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> FleetResult<Generator> {
        let _guard = self.generators.lock(name).await;

        let existing = self
            .generators
            .get(name)
            .await
            .ok_or_else(|| FleetError::generator_not_found(name))?;

        let is_active = patch.is_active.unwrap_or(existing.is_active);
        let possible_collectors = match patch.possible_collectors {
            Some(possible) => {
                let possible = dedup_preserving_order(possible);
                self.validate_collectors(is_active, &possible).await?;
                possible
            }
            None => {
                Self::validate_not_empty(is_active, &existing.possible_collectors)?;
                existing.possible_collectors.clone()
            }
        };

        let mut generator = Generator {
            name: existing.name.clone(),
            is_active,
            possible_collectors,
            current_collector: existing.current_collector.clone(),
        };

        generator.current_collector = if generator.is_active {
            let snapshot = self.snapshot(now).await;
            pick_collector(&generator, &snapshot, policy)
        } else {
            None
        };

        self.store.upsert_generator(&generator).await?;
        self.generators.put(generator.clone()).await;

        if generator.current_collector != existing.current_collector {
            info!(
                "updated generator {name}: {:?} -> {:?}",
                existing.current_collector, generator.current_collector
            );
        } else {
            debug!("updated generator {name}, assignment unchanged");
        }

        Ok(generator)
    }

    pub async fn get_generator(&self, name: &str) -> FleetResult<Generator> {
        self.generators
            .get(name)
            .await
            .ok_or_else(|| FleetError::generator_not_found(name))
    }

    pub async fn list_generators(&self) -> Vec<Generator> {
        self.generators.list().await
    }

    // ------------------------------------------------------------------------
    // Reassignment
    // ------------------------------------------------------------------------

    /// Move every generator off a collector that is no longer assignable
    ///
    /// Generators are processed in ascending name order, each under its own
    /// writer lock. A generator that was moved concurrently is skipped.
    #[instrument(skip(self))]
    pub async fn on_collector_died(
        &self,
        name: &str,
        now: Millis,
        policy: AssignmentPolicy,
    ) -> ReassignmentReport {
        let affected = self.generators.assigned_to(name).await;
        if affected.is_empty() {
            return ReassignmentReport::default();
        }

        info!("collector {name} died, reassigning {} generators", affected.len());

        let report = self
            .reassign(affected, now, policy, |generator, _| {
                generator.is_assigned_to(name)
            })
            .await;

        for failure in &report.failures {
            warn!(
                "could not persist new assignment for {}: {}",
                failure.generator, failure.error
            );
        }

        report
    }

    /// Periodic liveness sweep
    ///
    /// 1. Running collectors whose heartbeat is too old at `now` are marked
    ///    MissedHeartbeat (a heartbeat racing the sweep wins).
    /// 2. Generators of every collector that actually transitioned are moved.
    /// 3. Active generators still without a valid assignment are retried,
    ///    ascending by name. A generator whose write failed in step 2 waits
    ///    for the next sweep.
    ///
    /// Only changes of `current_collector` are reported, so a sweep over a
    /// settled fleet reports nothing.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: Millis, policy: AssignmentPolicy) -> SweepReport {
        let collectors = self.registry.snapshot().await;
        let stale = liveness::missed_heartbeat(collectors.values(), now, &self.heartbeat);

        let mut missed = Vec::with_capacity(stale.len());
        for collector in stale {
            let _guard = self.registry.lock(&collector.name).await;
            if let Some(marked) = self
                .registry
                .mark_missed_heartbeat(&collector.name, collector.last_heartbeat)
                .await
            {
                self.persist_collector(&marked).await;
                missed.push(marked.name);
            }
        }

        let mut report = ReassignmentReport::default();
        for name in &missed {
            report.merge(self.on_collector_died(name, now, policy).await);
        }
        let failed: HashSet<String> = report
            .failures
            .iter()
            .map(|f| f.generator.clone())
            .collect();
        report.merge(self.repair(now, policy, &failed).await);

        if !missed.is_empty() || !report.is_empty() {
            info!(
                "sweep at {now}: {} missed, {} reassigned, {} failed",
                missed.len(),
                report.reassigned.len(),
                report.failures.len()
            );
        } else {
            debug!("sweep at {now}: fleet settled");
        }

        SweepReport {
            now,
            missed,
            reassigned: report.reassigned,
            failures: report.failures,
        }
    }

    pub async fn summary(&self) -> FleetSummary {
        let collectors = self.registry.list().await;
        let generators = self.generators.list().await;

        FleetSummary {
            collectors: collectors.len(),
            running_collectors: collectors.iter().filter(|c| c.is_running()).count(),
            generators: generators.len(),
            active_generators: generators.iter().filter(|g| g.is_active).count(),
            unassigned_generators: self.generators.orphans().await.len(),
        }
    }

    /// Retry every active generator without a valid assignment
    ///
    /// Generators in `skip` already failed a write in this sweep and wait for
    /// the next one.
    async fn repair(
        &self,
        now: Millis,
        policy: AssignmentPolicy,
        skip: &HashSet<String>,
    ) -> ReassignmentReport {
        let snapshot = self.snapshot(now).await;

        let mut pending: Vec<String> = snapshot
            .generators
            .values()
            .filter(|g| g.is_active && !snapshot.has_valid_assignment(g))
            .filter(|g| !skip.contains(&g.name))
            .map(|g| g.name.clone())
            .collect();
        pending.sort();

        if pending.is_empty() {
            return ReassignmentReport::default();
        }

        debug!("retrying {} unplaced generators", pending.len());

        self.reassign(pending, now, policy, |generator, snapshot| {
            generator.is_active && !snapshot.has_valid_assignment(generator)
        })
        .await
    }

    /// Re-place `names` one by one against a shared batch snapshot
    ///
    /// `needs_move` is re-checked under the writer lock against the fresh
    /// record; generators that no longer need it are skipped.
    async fn reassign<F>(
        &self,
        names: Vec<String>,
        now: Millis,
        policy: AssignmentPolicy,
        needs_move: F,
    ) -> ReassignmentReport
    where
        F: Fn(&Generator, &FleetSnapshot) -> bool,
    {
        let mut snapshot = self.snapshot(now).await;
        let mut report = ReassignmentReport::default();

        for name in names {
            let _guard = self.generators.lock(&name).await;

            let Some(current) = self.generators.get(&name).await else {
                continue;
            };
            if !needs_move(&current, &snapshot) {
                debug!("{name} already moved, skipping");
                continue;
            }

            let from = current.current_collector.clone();
            let mut candidate = Generator {
                current_collector: None,
                ..current
            };
            let to = if candidate.is_active {
                pick_collector(&candidate, &snapshot, policy)
            } else {
                None
            };

            if to == from {
                continue;
            }

            match self.store.set_current_collector(&name, to.as_deref()).await {
                Ok(()) => {
                    self.generators.set_current(&name, to.clone()).await;
                    candidate.current_collector = to.clone();
                    report.reassigned.push(Reassignment {
                        generator: name,
                        from,
                        to,
                    });
                }
                Err(e) => {
                    self.generators.set_current(&name, None).await;
                    report.failures.push(ReassignmentFailure {
                        generator: name,
                        error: e.to_string(),
                    });
                }
            }

            snapshot.record(candidate);
        }

        report
    }

    async fn snapshot(&self, now: Millis) -> FleetSnapshot {
        FleetSnapshot::new(
            now,
            self.heartbeat,
            self.registry.snapshot().await,
            self.generators.list().await,
        )
    }

    async fn validate_collectors(&self, is_active: bool, possible: &[String]) -> FleetResult<()> {
        Self::validate_not_empty(is_active, possible)?;

        let known = self.registry.list_by_ids(possible).await;
        if let Some(missing) = possible
            .iter()
            .find(|name| !known.iter().any(|c| &c.name == *name))
        {
            return Err(FleetError::collector_not_found(missing));
        }

        Ok(())
    }

    fn validate_not_empty(is_active: bool, possible: &[String]) -> FleetResult<()> {
        if is_active && possible.is_empty() {
            return Err(FleetError::Validation(
                "an active generator needs at least one possible collector".to_string(),
            ));
        }
        Ok(())
    }

    /// Collector records are mirrored best effort; the registry stays
    /// authoritative while the store is unavailable
    ///
    /// Callers hold the collector's writer lock.
    async fn persist_collector(&self, collector: &Collector) {
        if let Err(e) = self.store.upsert_collector(collector).await {
            warn!("failed to persist collector {}: {e}", collector.name);
        }
    }
}
