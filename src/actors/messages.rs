//! Message types for actor communication
//!
//! 1. **Commands**: request/response messages sent to one actor via mpsc
//! 2. **Events**: broadcast notifications for any number of subscribers

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::Millis;
use crate::fleet::SweepReport;

/// Published after every sweep, periodic or on demand
///
/// Slow subscribers may lag and miss events; the next sweep report is
/// self-contained, so nothing needs to be replayed.
#[derive(Debug, Clone)]
pub struct SweepEvent {
    pub report: SweepReport,

    /// Whether the least-loaded policy was in effect for this sweep
    pub load_balancing: bool,
}

/// Commands that can be sent to the SweeperActor
#[derive(Debug)]
pub enum SweeperCommand {
    /// Run a sweep immediately (bypassing the interval timer)
    SweepNow {
        respond_to: oneshot::Sender<SweepReport>,
    },

    /// Switch between first-fit and least-loaded placement
    ///
    /// Takes effect for the next operation; a sweep in progress keeps the
    /// policy it started with.
    SetLoadBalancing { enabled: bool },

    /// Change the sweep interval
    UpdateInterval { interval_ms: u64 },

    GetStats {
        respond_to: oneshot::Sender<SweeperStats>,
    },

    /// Gracefully shut down the sweeper
    Shutdown,
}

/// Running totals kept by the sweeper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweeperStats {
    pub sweeps: u64,

    /// Collectors marked MissedHeartbeat
    pub missed: u64,

    /// Generators that changed collector
    pub reassigned: u64,

    /// Reassignments that could not be persisted
    pub failures: u64,

    /// Time of the last completed sweep
    pub last_sweep: Option<Millis>,

    pub interval_ms: u64,
}
