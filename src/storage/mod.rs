//! Fleet persistence
//!
//! The coordinator keeps the authoritative fleet state in memory and mirrors
//! it through the [`FleetStore`] trait so that a restarted hub can pick up
//! where it left off.
//!
//! ## Backends
//!
//! - **In-Memory** (`storage.backend = "none"`): no persistence, used by tests
//! - **SQLite** (`storage.backend = "sqlite"`, feature `storage-sqlite`)
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use collector_fleet::storage::{FleetStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn FleetStore> = Arc::new(SqliteStore::new("./fleet.db").await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use backend::{FleetStore, HealthStatus};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

use crate::config::StorageConfig;

/// Open the store described by the configuration
///
/// No configuration means the in-memory store.
pub async fn open_store(config: Option<&StorageConfig>) -> StorageResult<Arc<dyn FleetStore>> {
    match config {
        None | Some(StorageConfig::None) => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "storage-sqlite")]
        Some(StorageConfig::Sqlite { path }) => Ok(Arc::new(sqlite::SqliteStore::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        Some(StorageConfig::Sqlite { .. }) => Err(StorageError::ConnectionFailed(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
