//! Tests for replaying the binlog into a sharded dictionary
//!
//! These tests verify:
//! - Only records after the stored offset are applied
//! - Replay is idempotent
//! - A torn tail is cut off the file
//! - Missing or damaged logs abort replay

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use optikv::binlog::{replay, stored_offset, BinlogRecord, BinlogWriter, OFFSET_KEY};
use optikv::dict::{Dictionary, MemoryDictionary, ShardedDictionary};
use optikv::{OptiError, SyncStrategy};
use tempfile::TempDir;

fn memory_dict(shards: usize) -> ShardedDictionary {
    let shards: Vec<Box<dyn Dictionary>> = (0..shards)
        .map(|_| Box::new(MemoryDictionary::new()) as Box<dyn Dictionary>)
        .collect();
    ShardedDictionary::new(shards).unwrap()
}

/// Write r1..r3 and return the end offset of each
fn write_three(path: &Path) -> Vec<u64> {
    let mut writer = BinlogWriter::open(path, SyncStrategy::EveryWrite).unwrap();
    let records = [
        vec![("r1".to_string(), Some(b"one".to_vec()))],
        vec![
            ("r2".to_string(), Some(b"two".to_vec())),
            ("r1".to_string(), None),
        ],
        vec![("r3".to_string(), Some(b"three".to_vec()))],
    ];
    records
        .into_iter()
        .map(|writes| writer.append(&BinlogRecord::new(writes)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_replay_from_start_applies_everything() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let ends = write_three(&path);
    let dict = memory_dict(4);

    let stats = replay(&path, &dict).await.unwrap();

    assert_eq!(stats.start_offset, 0);
    assert_eq!(stats.end_offset, ends[2]);
    assert_eq!(stats.records_applied, 3);
    assert_eq!(dict.read("r1").await.unwrap(), None);
    assert_eq!(dict.read("r2").await.unwrap(), Some(b"two".to_vec()));
    assert_eq!(dict.read("r3").await.unwrap(), Some(b"three".to_vec()));
    assert_eq!(stored_offset(&dict).await.unwrap(), ends[2]);
}

#[tokio::test]
async fn test_replay_resumes_after_stored_offset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let ends = write_three(&path);
    let dict = memory_dict(4);
    dict.write(OFFSET_KEY, ends[1].to_string().into_bytes())
        .await
        .unwrap();

    let stats = replay(&path, &dict).await.unwrap();

    assert_eq!(stats.start_offset, ends[1]);
    assert_eq!(stats.records_applied, 1);
    assert_eq!(dict.read("r1").await.unwrap(), None);
    assert_eq!(dict.read("r2").await.unwrap(), None);
    assert_eq!(dict.read("r3").await.unwrap(), Some(b"three".to_vec()));

    let again = replay(&path, &dict).await.unwrap();
    assert_eq!(again.records_applied, 0);
    assert_eq!(again.start_offset, ends[2]);
    assert_eq!(again.end_offset, ends[2]);
}

#[tokio::test]
async fn test_replay_cuts_torn_tail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let ends = write_three(&path);
    let torn = BinlogRecord::new(vec![("r4".to_string(), Some(b"four".to_vec()))])
        .encode()
        .unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&torn[..10]).unwrap();
    drop(file);

    let dict = memory_dict(2);
    let stats = replay(&path, &dict).await.unwrap();

    assert_eq!(stats.records_applied, 3);
    assert_eq!(stats.truncated_bytes, 10);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), ends[2]);
    assert_eq!(dict.read("r4").await.unwrap(), None);

    let mut writer = BinlogWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.position(), ends[2]);
    writer
        .append(&BinlogRecord::new(vec![("r5".to_string(), Some(b"five".to_vec()))]))
        .unwrap();
    let stats = replay(&path, &dict).await.unwrap();
    assert_eq!(stats.records_applied, 1);
    assert_eq!(dict.read("r5").await.unwrap(), Some(b"five".to_vec()));
}

#[tokio::test]
async fn test_replay_stops_at_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    write_three(&path);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    let dict = memory_dict(2);
    let result = replay(&path, &dict).await;

    assert!(matches!(result, Err(OptiError::BinlogCorruption { .. })));
    assert_eq!(dict.read("r2").await.unwrap(), Some(b"two".to_vec()));
    assert_eq!(dict.read("r3").await.unwrap(), None);
}

#[tokio::test]
async fn test_damaged_length_prefix_keeps_later_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let ends = write_three(&path);
    let mut bytes = std::fs::read(&path).unwrap();
    let r2 = ends[0] as usize;
    bytes[r2..r2 + 4].copy_from_slice(&1000u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let dict = memory_dict(2);
    let result = replay(&path, &dict).await;

    assert!(matches!(
        result,
        Err(OptiError::BinlogCorruption { offset, .. }) if offset == ends[0]
    ));
    assert_eq!(dict.read("r1").await.unwrap(), Some(b"one".to_vec()));
    assert_eq!(dict.read("r3").await.unwrap(), None);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), ends[2]);
}

#[tokio::test]
async fn test_missing_log_with_offset_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let dict = memory_dict(1);
    dict.write(OFFSET_KEY, b"42".to_vec()).await.unwrap();

    assert!(matches!(
        replay(&path, &dict).await,
        Err(OptiError::BinlogCorruption { offset: 42, .. })
    ));
}

#[tokio::test]
async fn test_missing_log_on_fresh_dictionary() {
    let dir = TempDir::new().unwrap();
    let dict = memory_dict(1);

    let stats = replay(&dir.path().join("binlog"), &dict).await.unwrap();

    assert_eq!(stats.records_applied, 0);
    assert_eq!(stats.end_offset, 0);
}

#[tokio::test]
async fn test_unparsable_offset_rejected() {
    let dict = memory_dict(1);
    dict.write(OFFSET_KEY, b"not-a-number".to_vec()).await.unwrap();

    assert!(stored_offset(&dict).await.is_err());
}
