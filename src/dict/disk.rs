//! Disk dictionary
//!
//! The on-disk engine: a memtable in front of the shard's SSTables.
//!
//! The memtable is only made durable by `flush`. Between flushes durability
//! comes from the binlog, which disk-backed stacks always keep: the reserved
//! offset key lives in some shard's memtable too, and the engine flushes that
//! shard last.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;

use super::{Dictionary, Value};

/// Memtable + SSTable partition rooted in its own directory
pub struct DiskDictionary {
    memtable: MemTable,
    storage: StorageManager,
    memtable_limit: usize,
}

impl DiskDictionary {
    /// Open (or create) the partition stored in `dir`
    pub fn open(dir: &Path, memtable_limit: usize) -> Result<Self> {
        let storage = StorageManager::open(dir)?;
        tracing::debug!(
            "Opened disk shard {} with {} SSTables",
            dir.display(),
            storage.sstable_count()
        );

        Ok(Self {
            memtable: MemTable::new(),
            storage,
            memtable_limit,
        })
    }

    /// Number of SSTables on disk
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}

#[async_trait]
impl Dictionary for DiskDictionary {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        match self.memtable.get(key.as_bytes()) {
            Some(MemTableEntry::Value(value)) => Ok(Some(value.clone())),
            Some(MemTableEntry::Tombstone) => Ok(None),
            None => self.storage.get(key.as_bytes()),
        }
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        self.memtable.put(key.as_bytes().to_vec(), value);
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.memtable.delete(key.as_bytes().to_vec());
        Ok(())
    }

    fn footprint(&self) -> usize {
        self.memtable.size()
    }

    fn needs_flush(&self) -> bool {
        self.memtable.should_flush(self.memtable_limit)
    }

    async fn flush(&mut self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        Ok(())
    }
}
