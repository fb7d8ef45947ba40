pub mod actors;
pub mod api;
pub mod client;
pub mod config;
pub mod fleet;
pub mod monitors;
pub mod storage;
pub mod util;

pub use fleet::{
    AssignmentPolicy, Collector, CollectorStatus, FleetCoordinator, FleetError, FleetResult,
    Generator, GeneratorPatch, GeneratorSpec, TieBreak,
};

/// Milliseconds since the Unix epoch.
///
/// Every timestamp in the fleet (heartbeats, sweep times, registration) is
/// compared as an integer millisecond value, never as a floating point or
/// rounded duration.
pub type Millis = i64;
