//! MemTable implementation
//!
//! Plain BTreeMap owned by its disk shard; the shard lock serializes access.

use std::collections::BTreeMap;

use super::MemTableEntry;

/// Fixed per-entry accounting cost on top of key and value bytes
const ENTRY_OVERHEAD: usize = 32;

/// In-memory table for recent writes
#[derive(Default)]
pub struct MemTable {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    size: usize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry by key
    pub fn get(&self, key: &[u8]) -> Option<&MemTableEntry> {
        self.data.get(key)
    }

    /// Put a key-value pair; returns the new approximate size
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Value(value))
    }

    /// Insert a tombstone; returns the new approximate size
    pub fn delete(&mut self, key: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Tombstone)
    }

    fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let added = entry_size(&key, &entry);
        let removed = self
            .data
            .get(&key)
            .map(|old| entry_size(&key, old))
            .unwrap_or(0);
        self.data.insert(key, entry);

        self.size = self.size + added - removed;
        self.size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size >= size_limit
    }

    /// All entries in sorted key order (for flush)
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &MemTableEntry)> {
        self.data.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&mut self) {
        self.data.clear();
        self.size = 0;
    }
}

fn entry_size(key: &[u8], entry: &MemTableEntry) -> usize {
    let value_len = match entry {
        MemTableEntry::Value(v) => v.len(),
        MemTableEntry::Tombstone => 0,
    };
    key.len() + value_len + ENTRY_OVERHEAD
}
