//! Configuration for the allocation core

use crate::types::ClassCounts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Allocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Per-holder limits
    pub limits: LimitsConfig,

    /// Initial stock per class
    pub inventory: InventoryConfig,

    /// Behavioral policies
    pub policy: PolicyConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/allocation"),
            service_name: "allocation-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            limits: LimitsConfig::default(),
            inventory: InventoryConfig::default(),
            policy: PolicyConfig::default(),
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// Per-holder limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum total holdings across classes
    pub holder_cap: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { holder_cap: 10 }
    }
}

/// Initial stock per class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// VIP capacity
    pub vip: u32,

    /// Regular capacity
    pub regular: u32,
}

impl InventoryConfig {
    /// Capacity as per-class counts
    pub fn capacity(&self) -> ClassCounts {
        ClassCounts::new(self.vip, self.regular)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            vip: 30,
            regular: 200,
        }
    }
}

/// Which queued requests a drain processes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainScope {
    /// Every queued request, whoever submitted it
    #[default]
    Global,
    /// Only the triggering holder's requests
    OwnEntries,
}

/// How cancellation returns stock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Always increment availability
    #[default]
    Unbounded,
    /// Never raise availability above the class capacity
    ClampToCapacity,
}

/// Behavioral policies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Drain scope
    #[serde(default)]
    pub drain_scope: DrainScope,

    /// Release policy on cancellation
    #[serde(default)]
    pub release: ReleasePolicy,

    /// Drain on behalf of the submitter right after every submission
    #[serde(default)]
    pub auto_drain: bool,
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Fsync every write
    pub sync_writes: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_background_jobs: 2,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("ALLOC_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(cap) = std::env::var("ALLOC_HOLDER_CAP") {
            config.limits.holder_cap = cap
                .parse()
                .map_err(|e| crate::Error::Config(format!("ALLOC_HOLDER_CAP: {}", e)))?;
        }

        if let Ok(flag) = std::env::var("ALLOC_AUTO_DRAIN") {
            config.policy.auto_drain = flag
                .parse()
                .map_err(|e| crate::Error::Config(format!("ALLOC_AUTO_DRAIN: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> crate::Result<()> {
        if self.limits.holder_cap == 0 {
            return Err(crate::Error::Config(
                "holder_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
