//! Engine Module
//!
//! The transaction executor that coordinates all components.
//!
//! ## Responsibilities
//! - Build the dictionary stack selected by [`EngineKind`]
//! - Claim the persistence directory and replay the binlog on startup
//! - Execute transactions: check conditions, then write, under shard locks
//! - Keep binlog order identical to application order
//! - Checkpoint on-disk shards when their memtables fill up

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::binlog::{self, BinlogRecord, BinlogWriter, ReplayStats, OFFSET_KEY};
use crate::cache::{FlushingCache, LazyFanout, WriteThroughCache};
use crate::config::{Config, EngineKind};
use crate::dict::{
    DiskDictionary, Dictionary, EnhancedDictionary, ShardGuard, ShardedDictionary, Value,
};
use crate::error::{OptiError, Result};
use crate::lifecycle::{DirLock, Permit, ShutdownHook};
use crate::swap::{GenerationalAllocator, ShardedAllocator, SwapAllocator, SwapStats};
use crate::txn::{condition_holds, Transaction, TxnOutcome};

/// Slots in the lazy fan-out behind each flushing cache shard
const FANOUT_WIDTH: usize = 8;

/// Engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Transactions whose conditions held
    pub accepted: u64,

    /// Transactions rejected by a condition mismatch
    pub rejected: u64,

    /// Transactions that returned an error
    pub failed: u64,

    /// Young generation occupancy (swap-backed stacks only)
    pub young: Option<SwapStats>,

    /// Old generation occupancy (swap-backed stacks only)
    pub old: Option<SwapStats>,

    /// Young → old promotions so far
    pub promotions: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// The optimistic transaction engine
///
/// ## Concurrency Model
///
/// - A transaction locks every shard owning one of its keys (ascending shard
///   order) and holds them from the first condition read to the last reply
///   read, so check-then-write is atomic per shard.
/// - Commits additionally take the binlog lock (always after the shard locks),
///   making log order equal to application order.
/// - Transactions on disjoint shards run fully in parallel when no binlog is
///   configured.
pub struct Database {
    /// Engine configuration
    config: Config,

    /// The sharded dictionary stack
    dict: ShardedDictionary,

    /// Binlog writer; `None` when logging is disabled
    binlog: Option<Mutex<BinlogWriter>>,

    /// Shared swap allocator when the stack is swap-backed
    allocator: Option<Arc<GenerationalAllocator>>,

    /// Held until `close`
    dir_lock: parking_lot::Mutex<Option<DirLock>>,

    /// Replay result from startup
    replayed: ReplayStats,

    counters: Counters,
}

impl Database {
    /// Open the engine described by `config`
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Claim the persistence directory (if any)
    /// 3. Build the dictionary stack
    /// 4. Replay the binlog from the stored offset
    /// 5. Open the binlog for appends
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let dir_lock = match &config.data_dir {
            Some(dir) => Some(DirLock::acquire(dir)?),
            None => None,
        };

        match Self::open_locked(&config).await {
            Ok((dict, allocator, binlog, replayed)) => Ok(Self {
                config,
                dict,
                binlog: binlog.map(Mutex::new),
                allocator,
                dir_lock: parking_lot::Mutex::new(dir_lock),
                replayed,
                counters: Counters::default(),
            }),
            Err(e) => {
                if let Some(lock) = dir_lock {
                    if let Err(release_err) = lock.release() {
                        tracing::warn!("Failed to release directory lock: {}", release_err);
                    }
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    async fn open_locked(
        config: &Config,
    ) -> Result<(
        ShardedDictionary,
        Option<Arc<GenerationalAllocator>>,
        Option<BinlogWriter>,
        ReplayStats,
    )> {
        let (dict, allocator) = Self::build_dictionary(config)?;

        let binlog_file = config.binlog_file();
        let (binlog, replayed) = match &binlog_file {
            Some(path) => {
                let replayed = binlog::replay(path, &dict).await?;
                let writer = BinlogWriter::open(path, config.binlog_sync_strategy)?;
                (Some(writer), replayed)
            }
            None => (None, ReplayStats::default()),
        };

        tracing::info!(
            "Opened {:?} engine with {} shards (binlog: {})",
            config.engine,
            dict.shard_count(),
            binlog_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );
        Ok((dict, allocator, binlog, replayed))
    }

    // =========================================================================
    // Stack Construction
    // =========================================================================

    fn build_dictionary(
        config: &Config,
    ) -> Result<(ShardedDictionary, Option<Arc<GenerationalAllocator>>)> {
        let mut shards: Vec<Box<dyn Dictionary>> = Vec::with_capacity(config.shards);
        let mut allocator = None;
        let soft_limit = config.shard_soft_limit();

        match (config.engine, config.data_dir.as_deref()) {
            (EngineKind::Swap, _) => {
                let swap = Self::shared_allocator(config, &mut allocator)?;
                for _ in 0..config.shards {
                    shards.push(Box::new(EnhancedDictionary::new(swap.clone())));
                }
            }
            (EngineKind::Disk, Some(dir)) => {
                for index in 0..config.shards {
                    shards.push(Box::new(DiskDictionary::open(
                        &Self::shard_dir(dir, index),
                        config.memtable_size_limit,
                    )?));
                }
            }
            (EngineKind::Disk, None) => {
                return Err(OptiError::Config(
                    "the disk engine requires a persistence directory".to_string(),
                ));
            }
            (EngineKind::Hybrid, Some(dir)) => {
                for index in 0..config.shards {
                    let disk = DiskDictionary::open(
                        &Self::shard_dir(dir, index),
                        config.memtable_size_limit,
                    )?;
                    shards.push(Box::new(WriteThroughCache::new(disk, soft_limit)));
                }
            }
            (EngineKind::Hybrid, None) if config.hybrid_flushing => {
                let swap = Self::shared_allocator(config, &mut allocator)?;
                let stale_after = config.flush_interval.unwrap_or(Duration::from_secs(1));
                for _ in 0..config.shards {
                    let swap = swap.clone();
                    let fanout = LazyFanout::new(FANOUT_WIDTH, move |_| {
                        Ok(EnhancedDictionary::new(swap.clone()))
                    })?;
                    shards.push(Box::new(FlushingCache::new(fanout, soft_limit, stale_after)));
                }
            }
            (EngineKind::Hybrid, None) => {
                let swap = Self::shared_allocator(config, &mut allocator)?;
                for _ in 0..config.shards {
                    let enhanced = EnhancedDictionary::new(swap.clone());
                    shards.push(Box::new(WriteThroughCache::new(enhanced, soft_limit)));
                }
            }
        }

        Ok((ShardedDictionary::new(shards)?, allocator))
    }

    fn shared_allocator(
        config: &Config,
        slot: &mut Option<Arc<GenerationalAllocator>>,
    ) -> Result<Arc<dyn SwapAllocator>> {
        let young = ShardedAllocator::with_buckets(
            config.allocator_shards,
            config.young_buckets,
            config.bucket_capacity,
        )?;
        let old = ShardedAllocator::with_buckets(
            config.allocator_shards,
            config.old_buckets,
            config.bucket_capacity,
        )?;
        let generational = Arc::new(GenerationalAllocator::new(
            Box::new(young),
            Box::new(old),
            config.promotion_delay,
        ));
        *slot = Some(generational.clone());
        Ok(generational)
    }

    fn shard_dir(data_dir: &Path, index: usize) -> PathBuf {
        data_dir.join(format!("shard_{:03}", index))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Execute one transaction
    ///
    /// Steps:
    /// 1. Lock every shard the transaction touches
    /// 2. Evaluate all conditions; any mismatch rejects the writes
    /// 3. If accepted, apply the writes and log them as one record
    /// 4. Read back every requested key
    ///
    /// The permit ties the call to the shutdown barrier; a rejected
    /// transaction is `Ok` with `applied == false`.
    pub async fn execute(&self, _permit: &Permit, txn: &Transaction) -> Result<TxnOutcome> {
        let result = self.execute_locked(txn).await;
        let counter = match &result {
            Ok(outcome) if outcome.applied => &self.counters.accepted,
            Ok(_) => &self.counters.rejected,
            Err(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    async fn execute_locked(&self, txn: &Transaction) -> Result<TxnOutcome> {
        if txn.writes.contains_key(OFFSET_KEY) {
            return Err(OptiError::ReservedKey(OFFSET_KEY.to_string()));
        }

        let logged = self.binlog.is_some() && !txn.is_read_only();
        let mut guard = self
            .dict
            .lock(txn.keys().chain(logged.then_some(OFFSET_KEY)))
            .await;

        let mut applied = true;
        for (key, expected) in &txn.conditions {
            let current = guard.read(key).await?;
            if !condition_holds(expected.as_deref(), current.as_deref()) {
                applied = false;
                break;
            }
        }

        if applied && !txn.is_read_only() {
            self.commit(&mut guard, txn).await?;
        }

        let mut values = Vec::with_capacity(txn.reads.len());
        for key in txn.unique_reads() {
            values.push((key.to_string(), guard.read(key).await?));
        }

        let wants_checkpoint = guard.needs_flush();
        drop(guard);
        if wants_checkpoint {
            self.checkpoint().await?;
        }

        tracing::trace!("Transaction {} resolved (applied: {})", txn.id, applied);
        Ok(TxnOutcome { applied, values })
    }

    /// Apply the writes, append the record, advance the stored offset
    ///
    /// A failed write or append restores every key already written.
    async fn commit(&self, guard: &mut ShardGuard<'_>, txn: &Transaction) -> Result<()> {
        let mut binlog = match &self.binlog {
            Some(binlog) => Some(binlog.lock().await),
            None => None,
        };

        let mut undo: Vec<(&str, Option<Value>)> = Vec::with_capacity(txn.writes.len());
        for (key, value) in &txn.writes {
            let prior = match guard.read(key).await {
                Ok(prior) => prior,
                Err(e) => {
                    Self::rollback(guard, undo).await;
                    return Err(e);
                }
            };
            undo.push((key.as_str(), prior));

            if let Err(e) = guard.apply(key, value.clone()).await {
                Self::rollback(guard, undo).await;
                return Err(e);
            }
        }

        if let Some(writer) = binlog.as_mut() {
            let record = BinlogRecord::new(
                txn.writes
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            );
            let end = match writer.append(&record) {
                Ok(end) => end,
                Err(e) => {
                    Self::rollback(guard, undo).await;
                    return Err(e);
                }
            };

            // The record is already durable; a stale offset only means replay
            // re-applies it.
            if let Err(e) = guard.write(OFFSET_KEY, end.to_string().into_bytes()).await {
                tracing::warn!("Failed to advance binlog offset to {}: {}", end, e);
            }
        }
        Ok(())
    }

    async fn rollback(guard: &mut ShardGuard<'_>, undo: Vec<(&str, Option<Value>)>) {
        for (key, prior) in undo.into_iter().rev() {
            if let Err(e) = guard.apply(key, prior).await {
                tracing::error!("Failed to restore '{}' during rollback: {}", key, e);
            }
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Make every shard durable
    ///
    /// The binlog is synced first and the shard holding the offset key is
    /// flushed last, so the durable offset never points past durable data.
    pub async fn checkpoint(&self) -> Result<()> {
        let mut all = self.dict.lock_all().await;
        if let Some(binlog) = &self.binlog {
            binlog.lock().await.sync()?;
        }
        all.flush(Some(OFFSET_KEY)).await
    }

    /// Run one round of background housekeeping on every shard
    pub async fn maintain(&self) -> Result<()> {
        self.dict.maintain().await
    }

    /// Spawn the periodic maintenance task
    ///
    /// Returns `None` when no flush interval is configured. The task holds a
    /// strong reference; abort the handle before closing.
    pub fn spawn_maintenance(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.flush_interval?;
        let db = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = db.maintain().await {
                    tracing::warn!("Background maintenance failed: {}", e);
                }
            }
        }))
    }

    /// Flush everything, sync the binlog and release the directory lock
    ///
    /// Call only after the shutdown barrier has drained. Calling it twice is
    /// harmless.
    pub async fn close(&self) -> Result<()> {
        self.checkpoint().await?;

        let dir_lock = self.dir_lock.lock().take();
        if let Some(lock) = dir_lock {
            lock.release()?;
        }
        tracing::info!("Database closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            young: self.allocator.as_ref().map(|a| a.young_stats()),
            old: self.allocator.as_ref().map(|a| a.old_stats()),
            promotions: self
                .allocator
                .as_ref()
                .map(|a| a.promotions())
                .unwrap_or(0),
        }
    }

    /// What replay did at startup
    pub fn replay_stats(&self) -> ReplayStats {
        self.replayed
    }

    /// Current binlog end offset (`None` without a binlog)
    pub async fn binlog_position(&self) -> Option<u64> {
        match &self.binlog {
            Some(binlog) => Some(binlog.lock().await.position()),
            None => None,
        }
    }

    /// Replay offset currently stored in the dictionary
    pub async fn stored_offset(&self) -> Result<u64> {
        binlog::stored_offset(&self.dict).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl ShutdownHook for Arc<Database> {
    fn name(&self) -> &str {
        "database"
    }

    async fn shutdown(&self) -> Result<()> {
        self.close().await
    }
}
