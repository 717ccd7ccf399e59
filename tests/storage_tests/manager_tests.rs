//! Tests for StorageManager
//!
//! These tests verify:
//! - Flushing MemTables to SSTables
//! - Newest-first lookups with tombstone shadowing
//! - Rediscovery after reopening
//! - Compaction past the table threshold

use std::fs;

use optikv::memtable::MemTable;
use optikv::storage::{StorageManager, COMPACTION_THRESHOLD};
use optikv::OptiError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memtable_with(puts: &[(&[u8], &[u8])], deletes: &[&[u8]]) -> MemTable {
    let mut memtable = MemTable::new();
    for (key, value) in puts {
        memtable.put(key.to_vec(), value.to_vec());
    }
    for key in deletes {
        memtable.delete(key.to_vec());
    }
    memtable
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("shard_000");

    let manager = StorageManager::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(manager.sstable_count(), 0);
}

#[test]
fn test_flush_empty_memtable_fails() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    let result = manager.flush(&MemTable::new());

    assert!(matches!(result, Err(OptiError::Storage(_))));
}

#[test]
fn test_newer_table_wins() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    manager
        .flush(&memtable_with(&[(b"k", b"old"), (b"other", b"x")], &[]))
        .unwrap();
    manager.flush(&memtable_with(&[(b"k", b"new")], &[])).unwrap();

    assert_eq!(manager.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(manager.get(b"other").unwrap(), Some(b"x".to_vec()));
    assert_eq!(manager.get(b"missing").unwrap(), None);
}

#[test]
fn test_tombstone_hides_older_value() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    manager.flush(&memtable_with(&[(b"k", b"v")], &[])).unwrap();
    manager.flush(&memtable_with(&[], &[b"k"])).unwrap();

    assert_eq!(manager.get(b"k").unwrap(), None);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_rediscovers_tables() {
    let temp = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp.path()).unwrap();
        manager.flush(&memtable_with(&[(b"a", b"1")], &[])).unwrap();
        manager.flush(&memtable_with(&[(b"a", b"2")], &[])).unwrap();
    }

    let manager = StorageManager::open(temp.path()).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.get(b"a").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_reopen_discards_unfinished_build() {
    let temp = TempDir::new().unwrap();
    let leftover = temp.path().join("sstable_000009.tmp");
    fs::write(&leftover, b"half written").unwrap();

    let manager = StorageManager::open(temp.path()).unwrap();

    assert_eq!(manager.sstable_count(), 0);
    assert!(!leftover.exists());
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compaction_after_threshold() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    manager.flush(&memtable_with(&[(b"gone", b"x")], &[])).unwrap();
    for i in 0..COMPACTION_THRESHOLD {
        let value = format!("v{}", i);
        manager
            .flush(&memtable_with(&[(b"k", value.as_bytes())], &[b"gone"]))
            .unwrap();
    }

    assert_eq!(manager.sstable_count(), 1);
    let last = format!("v{}", COMPACTION_THRESHOLD - 1);
    assert_eq!(manager.get(b"k").unwrap(), Some(last.into_bytes()));
    assert_eq!(manager.get(b"gone").unwrap(), None);

    let files = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(files, 1);
}

#[test]
fn test_compact_single_table_is_noop() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();
    manager.flush(&memtable_with(&[(b"k", b"v")], &[])).unwrap();

    assert!(manager.compact().unwrap().is_none());
    assert_eq!(manager.sstable_count(), 1);
}
