//! Dictionary Module
//!
//! Async key-value partitions and the sharded router in front of them.
//!
//! ## Responsibilities
//! - One trait, [`Dictionary`], implemented by every storage variant
//! - Baseline in-memory map ([`MemoryDictionary`])
//! - Swap-handle backed map ([`EnhancedDictionary`])
//! - Memtable + SSTable engine ([`DiskDictionary`])
//! - Hash routing over independently locked shards ([`ShardedDictionary`])
//!
//! ## Serialization
//! A partition is never shared directly. Each one sits behind the async mutex
//! of its shard, so methods take `&mut self` and the shard lock is the single
//! serialization point for every key it owns.

mod disk;
mod enhanced;
mod memory;
mod sharded;

pub use disk::DiskDictionary;
pub use enhanced::EnhancedDictionary;
pub use memory::MemoryDictionary;
pub use sharded::{ShardGuard, ShardedDictionary};

use async_trait::async_trait;

use crate::error::Result;

/// Stored value bytes
pub type Value = Vec<u8>;

/// Approximate bookkeeping cost of one resident entry besides key and value
pub(crate) const ENTRY_OVERHEAD: usize = 48;

/// Single-partition async key-value store
#[async_trait]
pub trait Dictionary: Send {
    /// Current value of `key`, or `None` if absent
    async fn read(&mut self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`
    async fn write(&mut self, key: &str, value: Value) -> Result<()>;

    /// Make `key` absent
    async fn remove(&mut self, key: &str) -> Result<()>;

    /// Estimated resident bytes held by this partition
    fn footprint(&self) -> usize {
        0
    }

    /// Whether buffered state should be made durable soon
    fn needs_flush(&self) -> bool {
        false
    }

    /// Push all buffered state to the layer below
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Periodic housekeeping (background flush of stale dirty entries)
    async fn maintain(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<D: Dictionary + ?Sized> Dictionary for Box<D> {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        (**self).read(key).await
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        (**self).write(key, value).await
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    fn footprint(&self) -> usize {
        (**self).footprint()
    }

    fn needs_flush(&self) -> bool {
        (**self).needs_flush()
    }

    async fn flush(&mut self) -> Result<()> {
        (**self).flush().await
    }

    async fn maintain(&mut self) -> Result<()> {
        (**self).maintain().await
    }
}

/// Routing hash for shards and fan-out slots
///
/// On-disk shard directories depend on it, so it must not change between
/// builds: CRC32 of the key, spread over 64 bits by a splitmix finalizer.
pub fn hash_key(key: &str) -> u64 {
    let mut x = crc32fast::hash(key.as_bytes()) as u64;
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Write `value` or remove the key when `value` is `None`
pub(crate) async fn apply<D: Dictionary + ?Sized>(
    dict: &mut D,
    key: &str,
    value: Option<Value>,
) -> Result<()> {
    match value {
        Some(value) => dict.write(key, value).await,
        None => dict.remove(key).await,
    }
}
