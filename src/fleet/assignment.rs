//! Assignment engine
//!
//! Decides which collector a generator should run on. The engine is pure: it
//! reads a [`FleetSnapshot`] and returns a collector name, the coordinator
//! writes the result.
//!
//! ## Policies
//!
//! ```text
//! FirstFit:     first assignable collector in possible_collectors order
//!
//! LeastLoaded:  min by (current load,
//!                       tie-break key,
//!                       position in possible_collectors)
//! ```
//!
//! Under both policies a generator whose current collector is still eligible
//! and assignable keeps it. Placement is only re-evaluated on explicit
//! triggers, never to "improve" an already valid assignment.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Millis, config::HeartbeatConfig};

use super::model::{Collector, Generator};

/// Secondary ordering among equally loaded collectors
///
/// `widest_eligibility` ranks by the summed `possible_collectors` length of
/// every generator that lists the collector; set it to get that rule
/// instead of the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer the collector listed by the fewest other generators, keeping
    /// popular collectors free for generators with fewer alternatives
    #[default]
    FewestContenders,

    /// Prefer the collector whose other eligible generators have the most
    /// alternatives in total
    WidestEligibility,
}

/// Placement policy, chosen by the caller for a whole operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentPolicy {
    #[default]
    FirstFit,
    LeastLoaded(TieBreak),
}

impl AssignmentPolicy {
    pub fn from_flag(load_balancing: bool, tie_break: TieBreak) -> Self {
        if load_balancing {
            AssignmentPolicy::LeastLoaded(tie_break)
        } else {
            AssignmentPolicy::FirstFit
        }
    }
}

/// Shared load-balancing switch
///
/// Read once at the start of every operation; the resulting
/// [`AssignmentPolicy`] is then passed down explicitly so a whole sweep or
/// reassignment batch uses one consistent policy.
#[derive(Debug, Clone)]
pub struct PolicySwitch {
    load_balancing: Arc<AtomicBool>,
    tie_break: TieBreak,
}

impl PolicySwitch {
    pub fn new(load_balancing: bool, tie_break: TieBreak) -> Self {
        Self {
            load_balancing: Arc::new(AtomicBool::new(load_balancing)),
            tie_break,
        }
    }

    pub fn set_load_balancing(&self, enabled: bool) {
        self.load_balancing.store(enabled, Ordering::SeqCst);
    }

    pub fn is_load_balancing(&self) -> bool {
        self.load_balancing.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> AssignmentPolicy {
        AssignmentPolicy::from_flag(self.is_load_balancing(), self.tie_break)
    }
}

impl Default for PolicySwitch {
    fn default() -> Self {
        Self::new(false, TieBreak::default())
    }
}

/// Point-in-time view of the fleet used for placement decisions
///
/// Load counts derived from a snapshot may be slightly stale under
/// concurrent reassignment. Decisions are deterministic for a given snapshot.
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    /// Time at which liveness is evaluated
    pub now: Millis,

    pub heartbeat: HeartbeatConfig,

    /// Visible (not soft-deleted) collectors by name
    pub collectors: HashMap<String, Collector>,

    /// All generators by name
    pub generators: HashMap<String, Generator>,
}

impl FleetSnapshot {
    pub fn new(
        now: Millis,
        heartbeat: HeartbeatConfig,
        collectors: HashMap<String, Collector>,
        generators: impl IntoIterator<Item = Generator>,
    ) -> Self {
        Self {
            now,
            heartbeat,
            collectors,
            generators: generators
                .into_iter()
                .map(|g| (g.name.clone(), g))
                .collect(),
        }
    }

    /// Running, not deleted and alive at `now`
    pub fn is_assignable(&self, collector: &str) -> bool {
        self.collectors
            .get(collector)
            .is_some_and(|c| c.is_running() && self.heartbeat.is_alive(c.last_heartbeat, self.now))
    }

    /// Whether the generator's current collector is acceptable as it is
    pub fn has_valid_assignment(&self, generator: &Generator) -> bool {
        generator
            .current_collector
            .as_deref()
            .is_some_and(|current| generator.is_eligible(current) && self.is_assignable(current))
    }

    /// Generators (other than `excluding`) currently assigned to `collector`
    pub fn load(&self, collector: &str, excluding: &str) -> usize {
        self.others(excluding)
            .filter(|g| g.is_assigned_to(collector))
            .count()
    }

    /// Generators (other than `excluding`) that list `collector` as eligible
    pub fn contenders(&self, collector: &str, excluding: &str) -> usize {
        self.others(excluding)
            .filter(|g| g.is_eligible(collector))
            .count()
    }

    /// Sum of `possible_collectors.len()` over the other generators listing
    /// `collector`
    pub fn eligibility_weight(&self, collector: &str, excluding: &str) -> usize {
        self.others(excluding)
            .filter(|g| g.is_eligible(collector))
            .map(|g| g.possible_collectors.len())
            .sum()
    }

    /// Keep the snapshot in step with a decision that was just written, so
    /// later picks in the same batch see it
    pub fn record(&mut self, generator: Generator) {
        self.generators.insert(generator.name.clone(), generator);
    }

    fn others<'a>(&'a self, excluding: &'a str) -> impl Iterator<Item = &'a Generator> + 'a {
        self.generators.values().filter(move |g| g.name != excluding)
    }
}

#[derive(Debug)]
struct Candidate<'a> {
    position: usize,
    name: &'a str,
    load: usize,
    contenders: usize,
    eligibility_weight: usize,
}

impl Candidate<'_> {
    fn compare(&self, other: &Self, tie_break: TieBreak) -> CmpOrdering {
        let tie = match tie_break {
            TieBreak::FewestContenders => self.contenders.cmp(&other.contenders),
            TieBreak::WidestEligibility => other.eligibility_weight.cmp(&self.eligibility_weight),
        };

        self.load
            .cmp(&other.load)
            .then(tie)
            .then(self.position.cmp(&other.position))
    }
}

/// Pick the collector `generator` should run on
///
/// Returns `None` when `possible_collectors` is empty or when no eligible
/// collector is assignable. Does not look at `is_active`; forcing inactive
/// generators off their collector is the coordinator's job.
pub fn pick_collector(
    generator: &Generator,
    snapshot: &FleetSnapshot,
    policy: AssignmentPolicy,
) -> Option<String> {
    if generator.possible_collectors.is_empty() {
        return None;
    }

    if snapshot.has_valid_assignment(generator) {
        trace!(
            "{}: keeping valid assignment {:?}",
            generator.name, generator.current_collector
        );
        return generator.current_collector.clone();
    }

    let picked = match policy {
        AssignmentPolicy::FirstFit => first_fit(generator, snapshot),
        AssignmentPolicy::LeastLoaded(tie_break) => least_loaded(generator, snapshot, tie_break),
    };

    trace!("{}: {policy:?} picked {picked:?}", generator.name);
    picked
}

fn first_fit(generator: &Generator, snapshot: &FleetSnapshot) -> Option<String> {
    generator
        .possible_collectors
        .iter()
        .find(|name| snapshot.is_assignable(name))
        .cloned()
}

fn least_loaded(
    generator: &Generator,
    snapshot: &FleetSnapshot,
    tie_break: TieBreak,
) -> Option<String> {
    let candidates: Vec<Candidate> = generator
        .possible_collectors
        .iter()
        .enumerate()
        .filter(|(_, name)| snapshot.is_assignable(name))
        .map(|(position, name)| Candidate {
            position,
            name,
            load: snapshot.load(name, &generator.name),
            contenders: snapshot.contenders(name, &generator.name),
            eligibility_weight: snapshot.eligibility_weight(name, &generator.name),
        })
        .collect();

    trace!("{}: least-loaded candidates {candidates:?}", generator.name);

    candidates
        .into_iter()
        .min_by(|a, b| a.compare(b, tie_break))
        .map(|c| c.name.to_string())
}
