use std::path::PathBuf;

use tracing::{debug, trace};

use crate::{
    Millis,
    api::ApiConfig,
    fleet::{AssignmentPolicy, PolicySwitch, TieBreak},
    monitors::liveness,
    util,
};

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database file holding collectors and generators
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./fleet.db")
}

/// Heartbeat timing shared by collectors and the liveness sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct HeartbeatConfig {
    /// Expected time between two heartbeats of one collector
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Extra latency accepted on top of the interval before a collector
    /// counts as dead
    #[serde(default = "default_heartbeat_tolerance")]
    pub tolerance_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            tolerance_ms: default_heartbeat_tolerance(),
        }
    }
}

impl HeartbeatConfig {
    pub fn new(interval_ms: u64, tolerance_ms: u64) -> Self {
        Self {
            interval_ms,
            tolerance_ms,
        }
    }

    /// Whether a collector with this last heartbeat is alive at `now`
    pub fn is_alive(&self, last_heartbeat: Option<Millis>, now: Millis) -> bool {
        liveness::is_alive(last_heartbeat, now, self.interval_ms, self.tolerance_ms)
    }
}

fn default_heartbeat_interval() -> u64 {
    15_000
}

fn default_heartbeat_tolerance() -> u64 {
    5_000
}

/// Assignment policy selection
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct AssignmentConfig {
    /// Use the least-loaded policy instead of first-fit
    #[serde(default)]
    pub load_balancing: bool,

    /// Secondary ordering among equally loaded collectors
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl AssignmentConfig {
    pub fn policy(&self) -> AssignmentPolicy {
        AssignmentPolicy::from_flag(self.load_balancing, self.tie_break)
    }

    /// Shared switch handed to the sweeper and the API
    pub fn switch(&self) -> PolicySwitch {
        PolicySwitch::new(self.load_balancing, self.tie_break)
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub assignment: AssignmentConfig,

    /// Storage configuration (optional - defaults to in-memory)
    pub storage: Option<StorageConfig>,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Apply `FLEET_*` environment variables on top of the file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(interval_ms) = util::get_heartbeat_interval() {
            debug!("heartbeat interval overridden from environment: {interval_ms}ms");
            self.heartbeat.interval_ms = interval_ms;
        }

        if let Some(tolerance_ms) = util::get_heartbeat_tolerance() {
            debug!("heartbeat tolerance overridden from environment: {tolerance_ms}ms");
            self.heartbeat.tolerance_ms = tolerance_ms;
        }

        if let Some(enabled) = util::get_load_balancing() {
            debug!("load balancing overridden from environment: {enabled}");
            self.assignment.load_balancing = enabled;
        }
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
