//! Collector liveness evaluation
//!
//! ```text
//! last_heartbeat unset                         → dead
//! now - last_heartbeat >  interval + tolerance → dead
//! now - last_heartbeat <= interval + tolerance → alive   (the boundary is alive)
//! ```
//!
//! Everything in here is pure. The sweep decides what to do with the result.

use crate::{Millis, config::HeartbeatConfig, fleet::Collector};

/// Decide whether a collector that last checked in at `last_heartbeat` is
/// alive at `now`
pub fn is_alive(
    last_heartbeat: Option<Millis>,
    now: Millis,
    heartbeat_interval_ms: u64,
    tolerance_ms: u64,
) -> bool {
    let Some(last_heartbeat) = last_heartbeat else {
        return false;
    };

    let deadline = i64::try_from(heartbeat_interval_ms.saturating_add(tolerance_ms))
        .unwrap_or(i64::MAX);

    now.saturating_sub(last_heartbeat) <= deadline
}

/// Every Running collector whose heartbeat is too old at `now`
///
/// Paused, Stopped, already-missed and soft-deleted collectors are never
/// reported. The result is ordered by collector name.
pub fn missed_heartbeat<'a, I>(collectors: I, now: Millis, heartbeat: &HeartbeatConfig) -> Vec<Collector>
where
    I: IntoIterator<Item = &'a Collector>,
{
    let mut missed: Vec<Collector> = collectors
        .into_iter()
        .filter(|c| c.is_running())
        .filter(|c| !heartbeat.is_alive(c.last_heartbeat, now))
        .cloned()
        .collect();

    missed.sort_by(|a, b| a.name.cmp(&b.name));
    missed
}
