//! Request and response bodies of the hub API
//!
//! Shared between the axum handlers and the heartbeat client, so this module
//! is compiled without the `api` feature.

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::actors::SweeperStats;
use crate::fleet::{
    Collector, FleetSummary, Generator, Reassignment, ReassignmentFailure, ReassignmentReport,
};

/// POST /api/v1/collectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,

    #[serde(default)]
    pub version: String,
}

/// POST /api/v1/collectors/:name/heartbeat
///
/// The hub clamps the timestamp to its own clock; omit it to use hub time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Millis>,
}

/// A collector as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorInfo {
    #[serde(flatten)]
    pub collector: Collector,

    /// Liveness at the time of the request
    pub alive: bool,

    /// `last_heartbeat` as RFC 3339, for humans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorsResponse {
    pub collectors: Vec<CollectorInfo>,
    pub count: usize,
}

/// Reply to a heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub collector: Collector,

    /// Generators this collector should be running, ascending by name
    pub generators: Vec<String>,
}

/// Reply to stop / pause / delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResponse {
    /// Absent after a delete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<Collector>,

    pub reassigned: Vec<Reassignment>,
    pub failures: Vec<ReassignmentFailure>,
}

impl TransitionResponse {
    pub fn new(collector: Option<Collector>, report: ReassignmentReport) -> Self {
        Self {
            collector,
            reassigned: report.reassigned,
            failures: report.failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorsResponse {
    pub generators: Vec<Generator>,
    pub count: usize,
}

/// POST /api/v1/assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub load_balancing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub load_balancing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage_healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub fleet: FleetSummary,
    pub sweeper: SweeperStats,
    pub storage: String,
    pub load_balancing: bool,
}
