//! Collector fleet management
//!
//! Tracks remote collectors via heartbeats and assigns generators (recurring
//! polling jobs) to them.
//!
//! ## Components
//!
//! ```text
//!   Sweeper tick ──► FleetCoordinator::sweep(now)
//!                        │
//!                        ├─► liveness::missed_heartbeat   (pure)
//!                        ├─► CollectorRegistry::mark_missed_heartbeat (CAS per collector)
//!                        └─► on_collector_died(name)
//!                                 │
//!                                 └─► assignment::pick_collector (pure, per generator)
//!                                          │
//!                                          └─► FleetStore + GeneratorTable write
//! ```
//!
//! - **model**: `Collector` / `Generator` records and mutation payloads
//! - **registry**: collector records, heartbeat ingestion, status transitions
//! - **generators**: generator records with a per-generator writer lock
//! - **assignment**: first-fit and least-loaded placement
//! - **coordinator**: the explicit triggers (create, update, died, sweep)

pub mod assignment;
pub mod coordinator;
pub mod error;
pub mod generators;
pub mod model;
pub mod registry;

pub use assignment::{AssignmentPolicy, FleetSnapshot, PolicySwitch, TieBreak, pick_collector};
pub use coordinator::{
    FleetCoordinator, FleetSummary, HeartbeatAck, Reassignment, ReassignmentFailure,
    ReassignmentReport, SweepReport,
};
pub use error::{FleetError, FleetResult};
pub use generators::GeneratorTable;
pub use model::{Collector, CollectorStatus, Generator, GeneratorPatch, GeneratorSpec};
pub use registry::CollectorRegistry;
