//! Row types for the fleet tables
//!
//! Statuses are stored as their snake_case names and `possible_collectors`
//! as a JSON array, which keeps the configured preference order without a
//! join table. Conversions back into the fleet model are fallible: a row
//! with an unknown status or a malformed collector list is reported as
//! [`StorageError::CorruptRecord`] instead of being silently repaired.

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::fleet::{Collector, CollectorStatus, Generator};

use super::error::StorageError;

/// A row of the `collectors` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "storage-sqlite", derive(sqlx::FromRow))]
pub struct CollectorRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub last_heartbeat: Option<Millis>,
    pub version: String,
    pub registered_at: Millis,
    pub deleted: bool,
}

/// A row of the `generators` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "storage-sqlite", derive(sqlx::FromRow))]
pub struct GeneratorRow {
    pub name: String,
    pub is_active: bool,

    /// JSON array of collector names, in preference order
    pub possible_collectors: String,

    pub current_collector: Option<String>,
}

impl TryFrom<&Collector> for CollectorRow {
    type Error = StorageError;

    fn try_from(collector: &Collector) -> Result<Self, Self::Error> {
        let id = i64::try_from(collector.id).map_err(|_| {
            StorageError::SerializationError(format!(
                "collector id {} does not fit in a signed 64-bit column",
                collector.id
            ))
        })?;

        Ok(Self {
            id,
            name: collector.name.clone(),
            status: collector.status.as_str().to_string(),
            last_heartbeat: collector.last_heartbeat,
            version: collector.version.clone(),
            registered_at: collector.registered_at,
            deleted: collector.deleted,
        })
    }
}

impl TryFrom<CollectorRow> for Collector {
    type Error = StorageError;

    fn try_from(row: CollectorRow) -> Result<Self, Self::Error> {
        let status: CollectorStatus = row
            .status
            .parse()
            .map_err(|e: String| StorageError::CorruptRecord(format!("{}: {e}", row.name)))?;

        let id = u64::try_from(row.id).map_err(|_| {
            StorageError::CorruptRecord(format!("{}: negative id {}", row.name, row.id))
        })?;

        Ok(Collector {
            id,
            name: row.name,
            status,
            last_heartbeat: row.last_heartbeat,
            version: row.version,
            registered_at: row.registered_at,
            deleted: row.deleted,
        })
    }
}

impl TryFrom<&Generator> for GeneratorRow {
    type Error = StorageError;

    fn try_from(generator: &Generator) -> Result<Self, Self::Error> {
        Ok(Self {
            name: generator.name.clone(),
            is_active: generator.is_active,
            possible_collectors: serde_json::to_string(&generator.possible_collectors)?,
            current_collector: generator.current_collector.clone(),
        })
    }
}

impl TryFrom<GeneratorRow> for Generator {
    type Error = StorageError;

    fn try_from(row: GeneratorRow) -> Result<Self, Self::Error> {
        let possible_collectors: Vec<String> = serde_json::from_str(&row.possible_collectors)
            .map_err(|e| {
                StorageError::CorruptRecord(format!("{}: possible_collectors: {e}", row.name))
            })?;

        Ok(Generator {
            name: row.name,
            is_active: row.is_active,
            possible_collectors,
            current_collector: row.current_collector,
        })
    }
}
