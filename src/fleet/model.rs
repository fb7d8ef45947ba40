//! Collector and generator records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Millis;

/// Lifecycle status of a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStatus {
    /// Collector is checking in and may receive generators
    Running,

    /// Paused by an administrator, keeps its registration
    Paused,

    /// Stopped by an administrator (or soft-deleted)
    Stopped,

    /// The liveness sweep found the last heartbeat too old
    MissedHeartbeat,
}

impl CollectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorStatus::Running => "running",
            CollectorStatus::Paused => "paused",
            CollectorStatus::Stopped => "stopped",
            CollectorStatus::MissedHeartbeat => "missed_heartbeat",
        }
    }
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CollectorStatus::Running),
            "paused" => Ok(CollectorStatus::Paused),
            "stopped" => Ok(CollectorStatus::Stopped),
            "missed_heartbeat" => Ok(CollectorStatus::MissedHeartbeat),
            other => Err(format!("unknown collector status '{other}'")),
        }
    }
}

/// A remote worker process that runs generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collector {
    /// Numeric identity, assigned on first registration
    pub id: u64,

    /// Unique, immutable name
    pub name: String,

    pub status: CollectorStatus,

    /// Last heartbeat (ms since epoch); only heartbeat ingestion and
    /// registration move it, and never backwards
    pub last_heartbeat: Option<Millis>,

    /// Informational version string reported by the collector
    pub version: String,

    /// When the collector first registered (ms since epoch)
    pub registered_at: Millis,

    /// Soft-delete marker; the record is kept because generators may still
    /// reference it
    pub deleted: bool,
}

impl Collector {
    /// Create a freshly registered collector (Running, heartbeat = now)
    pub fn new(id: u64, name: impl Into<String>, version: impl Into<String>, now: Millis) -> Self {
        Self {
            id,
            name: name.into(),
            status: CollectorStatus::Running,
            last_heartbeat: Some(now),
            version: version.into(),
            registered_at: now,
            deleted: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == CollectorStatus::Running && !self.deleted
    }
}

/// A recurring polling job placed on exactly one collector at a time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Unique name
    pub name: String,

    /// Only `true` when `possible_collectors` is non-empty
    pub is_active: bool,

    /// Eligible collectors, in first-fit preference order
    pub possible_collectors: Vec<String>,

    /// Collector the generator is currently assigned to
    pub current_collector: Option<String>,
}

impl Generator {
    pub fn is_eligible(&self, collector: &str) -> bool {
        self.possible_collectors.iter().any(|c| c == collector)
    }

    pub fn is_assigned_to(&self, collector: &str) -> bool {
        self.current_collector.as_deref() == Some(collector)
    }

    /// Active but without a collector
    pub fn is_orphaned(&self) -> bool {
        self.is_active && self.current_collector.is_none()
    }
}

/// Payload for creating a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub name: String,

    #[serde(default)]
    pub possible_collectors: Vec<String>,

    #[serde(default)]
    pub is_active: bool,
}

impl GeneratorSpec {
    pub fn new(name: impl Into<String>, possible_collectors: &[&str], is_active: bool) -> Self {
        Self {
            name: name.into(),
            possible_collectors: possible_collectors.iter().map(|c| c.to_string()).collect(),
            is_active,
        }
    }
}

/// Partial update of a generator; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorPatch {
    #[serde(default)]
    pub possible_collectors: Option<Vec<String>>,

    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Remove duplicate collector names, keeping the first occurrence
pub(crate) fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}
