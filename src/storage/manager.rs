//! Storage Manager
//!
//! Manages the SSTables of one disk shard.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup (and discard unfinished builds)
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Merge tables once there are too many of them

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{OptiError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::{Lookup, SSTable, SSTableBuilder, SSTableReader};

/// Table count above which a flush triggers compaction
pub const COMPACTION_THRESHOLD: usize = 8;

/// Manages the storage layer of one shard
///
/// ## Concurrency:
/// - `sstables`: RwLock (lookups need the write side because readers seek)
/// - `next_sstable_id`: atomic counter
pub struct StorageManager {
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            match file_path.extension().and_then(|e| e.to_str()) {
                Some("sst") => {
                    if let Some(id) = Self::parse_sstable_id(&file_path) {
                        sstable_ids.push(id);
                    }
                }
                Some("tmp") => {
                    tracing::warn!("Removing unfinished SSTable {}", file_path.display());
                    fs::remove_file(&file_path)?;
                }
                _ => {}
            }
        }

        // Newest first
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let sstables = sstable_ids
            .iter()
            .map(|id| SSTableReader::open(&Self::sstable_path_with_dir(path, *id)))
            .collect::<Result<Vec<_>>>()?;

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// A tombstone in a newer table hides values in older ones.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            match reader.get(key)? {
                Lookup::Found(value) => return Ok(Some(value)),
                Lookup::Tombstone => return Ok(None),
                Lookup::Absent => continue,
            }
        }

        Ok(None)
    }

    /// Flush a MemTable to a new SSTable, compacting if the table count grew
    /// past [`COMPACTION_THRESHOLD`]
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(OptiError::Storage("Cannot flush empty MemTable".to_string()));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&path)?;

        let count = {
            let mut sstables = self.sstables.write();
            sstables.insert(0, reader);
            sstables.len()
        };

        if count > COMPACTION_THRESHOLD {
            self.compact()?;
        }

        Ok(metadata)
    }

    /// Merge every table into one
    ///
    /// Tombstones are carried over: until the old files are unlinked a crash
    /// could leave them visible below the merged table.
    pub fn compact(&self) -> Result<Option<SSTable>> {
        let mut sstables = self.sstables.write();
        if sstables.len() < 2 {
            return Ok(None);
        }

        // Newest first, so the first sighting of a key wins
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for reader in sstables.iter_mut() {
            for entry in reader.iter()? {
                let (key, value) = entry?;
                merged.entry(key).or_insert(value);
            }
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let mut builder = SSTableBuilder::new(&path)?;
        for (key, value) in &merged {
            match value {
                Some(v) => builder.add(key, v)?,
                None => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&path)?;

        let replaced = std::mem::replace(&mut *sstables, vec![reader]);
        for old in replaced {
            let old_path = old.path().to_path_buf();
            drop(old);
            fs::remove_file(&old_path)?;
        }

        tracing::debug!(
            "Compacted {} into {} ({} entries)",
            self.data_dir.display(),
            metadata.path.display(),
            metadata.entry_count
        );
        Ok(Some(metadata))
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
