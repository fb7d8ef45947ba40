//! Fleet store trait definition

use std::collections::HashMap;

use async_trait::async_trait;

use crate::fleet::{Collector, Generator};

use super::error::StorageResult;

/// Health status of the store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Backend-specific details
    pub metadata: HashMap<String, String>,
}

/// Persistence seam for the fleet
///
/// The coordinator keeps the authoritative state in memory and mirrors every
/// change through this trait, so a restarted hub can reload collectors and
/// generators. Implementations must be `Send + Sync` as they are shared
/// between the API, the sweeper and heartbeat handling.
///
/// Writes are whole-record upserts keyed by name; the only partial write is
/// [`FleetStore::set_current_collector`], which is what a reassignment batch
/// issues per generator.
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Insert or replace a collector record (including soft-deleted ones)
    async fn upsert_collector(&self, collector: &Collector) -> StorageResult<()>;

    /// Every stored collector, soft-deleted ones included
    async fn load_collectors(&self) -> StorageResult<Vec<Collector>>;

    /// Insert or replace a generator record
    async fn upsert_generator(&self, generator: &Generator) -> StorageResult<()>;

    /// Persist a reassignment result for one generator
    async fn set_current_collector(
        &self,
        generator: &str,
        collector: Option<&str>,
    ) -> StorageResult<()>;

    /// Every stored generator
    async fn load_generators(&self) -> StorageResult<Vec<Generator>>;

    /// Lightweight check that the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable statistics (e.g. "SQLite: 3 collectors, 12 generators")
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
