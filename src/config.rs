//! Configuration for OptiKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{OptiError, Result};

/// File name of the binlog inside the persistence directory
pub const DEFAULT_BINLOG_NAME: &str = "binlog";

/// Main configuration for an OptiKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Engine Selection
    // -------------------------------------------------------------------------
    /// Which storage stack backs the dictionary shards
    pub engine: EngineKind,

    /// Number of dictionary shards (independent serialization points)
    pub shards: usize,

    /// Persistence directory for the disk and hybrid engines
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── LOCK             (single-instance marker)
    ///     ├── binlog           (default binlog of disk-backed stacks)
    ///     └── shard_000/       (SSTables of one shard)
    pub data_dir: Option<PathBuf>,

    /// Use the flushing cache over lazily created swap dictionaries instead of
    /// the write-through cache (hybrid engine without `data_dir` only)
    pub hybrid_flushing: bool,

    // -------------------------------------------------------------------------
    // Memory Configuration
    // -------------------------------------------------------------------------
    /// Soft resident-size budget for caches (bytes, split across shards)
    pub soft_limit: usize,

    /// Max size of a disk shard's memtable before a checkpoint (bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Swap Allocator Configuration
    // -------------------------------------------------------------------------
    /// Bucket count of the young generation allocator
    pub young_buckets: usize,

    /// Bucket count of the old generation allocator
    pub old_buckets: usize,

    /// Arena size of a single bucket (bytes)
    pub bucket_capacity: usize,

    /// Number of allocator instances composed per generation
    pub allocator_shards: usize,

    /// Age after which a young swap handle is promoted on access
    pub promotion_delay: Duration,

    // -------------------------------------------------------------------------
    // Binlog Configuration
    // -------------------------------------------------------------------------
    /// Binlog file; `None` disables logging unless the stack is disk-backed
    /// (see [`Config::binlog_file`])
    pub binlog_path: Option<PathBuf>,

    /// Sync strategy: how often to fsync the binlog
    pub binlog_sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------
    /// Period of the background flush task; `None` disables it
    pub flush_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,
}

/// Storage stack selected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Values live in the generational swap allocator
    Swap,

    /// Memtable + SSTables on disk
    Disk,

    /// Bounded cache over disk (with `data_dir`) or over swap (without)
    Hybrid,
}

impl FromStr for EngineKind {
    type Err = OptiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "swap" => Ok(EngineKind::Swap),
            "disk" => Ok(EngineKind::Disk),
            "hybrid" => Ok(EngineKind::Hybrid),
            other => Err(OptiError::Config(format!(
                "unknown engine '{}' (expected swap, disk or hybrid)",
                other
            ))),
        }
    }
}

/// Binlog sync strategy
#[derive(Debug, Clone, Copy)]
pub enum SyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineKind::Swap,
            shards: 16,
            data_dir: None,
            hybrid_flushing: false,
            soft_limit: 256 * 1024 * 1024, // 256 MB
            memtable_size_limit: 16 * 1024 * 1024, // 16 MB
            young_buckets: 64,
            old_buckets: 256,
            bucket_capacity: 4 * 1024 * 1024, // 4 MB
            allocator_shards: 4,
            promotion_delay: Duration::from_secs(60),
            binlog_path: None,
            binlog_sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            flush_interval: Some(Duration::from_secs(1)),
            listen_addr: "127.0.0.1:7070".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(OptiError::Config("shards must be at least 1".to_string()));
        }
        if self.young_buckets == 0 || self.old_buckets == 0 {
            return Err(OptiError::Config(
                "young and old bucket counts must be at least 1".to_string(),
            ));
        }
        if self.allocator_shards == 0 {
            return Err(OptiError::Config(
                "allocator_shards must be at least 1".to_string(),
            ));
        }
        if self.bucket_capacity == 0 {
            return Err(OptiError::Config(
                "bucket_capacity must be non-zero".to_string(),
            ));
        }
        if self.engine == EngineKind::Disk && self.data_dir.is_none() {
            return Err(OptiError::Config(
                "the disk engine requires a persistence directory".to_string(),
            ));
        }
        if self.hybrid_flushing && self.data_dir.is_some() {
            tracing::warn!("hybrid_flushing is ignored when a persistence directory is set");
        }
        Ok(())
    }

    /// True when the dictionary shards include an on-disk partition
    pub fn is_disk_backed(&self) -> bool {
        self.data_dir.is_some() && matches!(self.engine, EngineKind::Disk | EngineKind::Hybrid)
    }

    /// Binlog file the engine opens
    ///
    /// Disk memtables only reach SSTables on checkpoint, so a disk-backed
    /// stack always logs, to `{data_dir}/binlog` unless a path is given.
    pub fn binlog_file(&self) -> Option<PathBuf> {
        match (&self.binlog_path, &self.data_dir) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(dir)) if self.is_disk_backed() => Some(dir.join(DEFAULT_BINLOG_NAME)),
            (None, _) => None,
        }
    }

    /// Soft limit for a single shard's cache
    pub fn shard_soft_limit(&self) -> usize {
        (self.soft_limit / self.shards.max(1)).max(1)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Select the storage engine
    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    /// Set the number of dictionary shards
    pub fn shards(mut self, count: usize) -> Self {
        self.config.shards = count;
        self
    }

    /// Set the persistence directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Select the flushing cache for the hybrid engine
    pub fn hybrid_flushing(mut self, enabled: bool) -> Self {
        self.config.hybrid_flushing = enabled;
        self
    }

    /// Set the soft memory limit (in bytes)
    pub fn soft_limit(mut self, bytes: usize) -> Self {
        self.config.soft_limit = bytes;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the young and old generation bucket counts
    pub fn buckets(mut self, young: usize, old: usize) -> Self {
        self.config.young_buckets = young;
        self.config.old_buckets = old;
        self
    }

    /// Set the arena size of each swap bucket
    pub fn bucket_capacity(mut self, bytes: usize) -> Self {
        self.config.bucket_capacity = bytes;
        self
    }

    /// Set the number of allocator instances per generation
    pub fn allocator_shards(mut self, count: usize) -> Self {
        self.config.allocator_shards = count;
        self
    }

    /// Set the young → old promotion delay
    pub fn promotion_delay(mut self, delay: Duration) -> Self {
        self.config.promotion_delay = delay;
        self
    }

    /// Enable the binlog at the given path
    pub fn binlog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.binlog_path = Some(path.into());
        self
    }

    /// Set the binlog sync strategy
    pub fn binlog_sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.binlog_sync_strategy = strategy;
        self
    }

    /// Set (or disable) the background flush interval
    pub fn flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
