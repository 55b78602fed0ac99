//! Configuration for CaskKV
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Default number of appends between flushes in `EveryN` mode
pub const DEFAULT_BATCH_SYNC_EVERY: usize = 100;

/// Main configuration for a CaskKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── segment-000001.log
    ///     ├── segment-000002.log
    ///     └── ...              (highest id is the active segment)
    pub data_dir: PathBuf,

    /// When appends are made durable
    pub sync_policy: SyncPolicy,

    /// Periodic flush interval (milliseconds). Accepted and reported, not acted upon.
    pub sync_interval_ms: u64,

    /// Segment size that would trigger compaction. Accepted and reported, not acted upon.
    pub compact_threshold_bytes: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections (size of the worker pool)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Segment sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every append (safest, slowest)
    Always,

    /// fsync after `count` appends, counted across all keys
    EveryN { count: usize },
}

impl SyncPolicy {
    /// Parse a sync mode name (`ALWAYS` / `EVERY_N`) as found in config files
    /// and command lines.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// `EVERY_N` with a zero `batch_sync_every` is a config error.
    pub fn parse(mode: &str, batch_sync_every: usize) -> Result<Self> {
        match mode.trim().to_ascii_uppercase().as_str() {
            "ALWAYS" => Ok(SyncPolicy::Always),
            "EVERY_N" if batch_sync_every == 0 => Err(CaskError::Config(
                "batch_sync_every must be a positive integer for EVERY_N".to_string(),
            )),
            "EVERY_N" => Ok(SyncPolicy::EveryN {
                count: batch_sync_every,
            }),
            other => Err(CaskError::Config(format!(
                "Invalid sync mode '{}'. Allowed: ALWAYS, EVERY_N",
                other
            ))),
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPolicy::Always => write!(f, "ALWAYS"),
            SyncPolicy::EveryN { count } => write!(f, "EVERY_N(n={})", count),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_policy: SyncPolicy::Always,
            sync_interval_ms: 50,
            compact_threshold_bytes: 0,
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 64,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the values that cannot be represented as invalid by the types alone
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CaskError::Config("data_dir must not be empty".to_string()));
        }
        if let SyncPolicy::EveryN { count: 0 } = self.sync_policy {
            return Err(CaskError::Config(
                "EVERY_N sync policy requires a positive count".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(CaskError::Config(
                "max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sync policy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync_policy = policy;
        self
    }

    /// Set the (reserved) periodic flush interval
    pub fn sync_interval_ms(mut self, ms: u64) -> Self {
        self.config.sync_interval_ms = ms;
        self
    }

    /// Set the (reserved) compaction threshold
    pub fn compact_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.compact_threshold_bytes = bytes;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
