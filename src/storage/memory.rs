//! In-memory fleet store (no persistence)
//!
//! Used when no storage backend is configured and throughout the tests. All
//! data is lost when the hub exits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::fleet::{Collector, Generator};

use super::backend::{FleetStore, HealthStatus};
use super::error::{StorageError, StorageResult};

#[derive(Default)]
pub struct MemoryStore {
    collectors: RwLock<HashMap<String, Collector>>,
    generators: RwLock<HashMap<String, Generator>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn upsert_collector(&self, collector: &Collector) -> StorageResult<()> {
        self.collectors
            .write()
            .await
            .insert(collector.name.clone(), collector.clone());
        Ok(())
    }

    async fn load_collectors(&self) -> StorageResult<Vec<Collector>> {
        Ok(self.collectors.read().await.values().cloned().collect())
    }

    async fn upsert_generator(&self, generator: &Generator) -> StorageResult<()> {
        self.generators
            .write()
            .await
            .insert(generator.name.clone(), generator.clone());
        Ok(())
    }

    async fn set_current_collector(
        &self,
        generator: &str,
        collector: Option<&str>,
    ) -> StorageResult<()> {
        let mut generators = self.generators.write().await;
        let record = generators.get_mut(generator).ok_or_else(|| {
            StorageError::QueryFailed(format!("generator '{generator}' is not stored"))
        })?;
        record.current_collector = collector.map(String::from);
        debug!("in-memory store: {generator} -> {collector:?}");
        Ok(())
    }

    async fn load_generators(&self) -> StorageResult<Vec<Generator>> {
        Ok(self.generators.read().await.values().cloned().collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory store operational".to_string(),
            metadata: HashMap::from([("backend".to_string(), "memory".to_string())]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        Ok(format!(
            "In-Memory: {} collectors, {} generators",
            self.collectors.read().await.len(),
            self.generators.read().await.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
