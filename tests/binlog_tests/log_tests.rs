//! Tests for binlog append and sequential reads
//!
//! These tests verify:
//! - Appends return increasing end offsets and survive reopen
//! - Readers resume from any record boundary
//! - A torn tail is reported as truncation, not corruption
//! - Checksum damage, damaged lengths and out-of-range offsets are corruption

use std::fs::OpenOptions;
use std::io::Write;

use optikv::binlog::{BinlogReader, BinlogRecord, BinlogWriter, ReadOutcome};
use optikv::{OptiError, SyncStrategy};
use tempfile::TempDir;

fn record(key: &str, value: &str) -> BinlogRecord {
    BinlogRecord::new(vec![(key.to_string(), Some(value.as_bytes().to_vec()))])
}

fn expect_record(outcome: ReadOutcome) -> (BinlogRecord, u64) {
    match outcome {
        ReadOutcome::Record { record, end } => (record, end),
        other => panic!("expected a record, got {:?}", other),
    }
}

#[test]
fn test_append_positions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");

    let (first, second) = {
        let mut writer = BinlogWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        assert_eq!(writer.position(), 0);
        let first = writer.append(&record("a", "1")).unwrap();
        let second = writer.append(&record("b", "2")).unwrap();
        assert!(second > first);
        (first, second)
    };

    let mut writer = BinlogWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.position(), second);
    let third = writer.append(&record("c", "3")).unwrap();
    assert!(third > second);

    let mut reader = BinlogReader::open(&path, first).unwrap();
    let (rec, end) = expect_record(reader.next_record().unwrap());
    assert_eq!(rec, record("b", "2"));
    assert_eq!(end, second);
    let (rec, _) = expect_record(reader.next_record().unwrap());
    assert_eq!(rec, record("c", "3"));
    assert!(matches!(reader.next_record().unwrap(), ReadOutcome::End));
}

#[test]
fn test_batched_sync_keeps_every_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");

    let mut writer =
        BinlogWriter::open(&path, SyncStrategy::EveryNEntries { count: 4 }).unwrap();
    for i in 0..10 {
        writer.append(&record(&format!("k{}", i), "v")).unwrap();
    }
    writer.sync().unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    let mut count = 0;
    while let ReadOutcome::Record { .. } = reader.next_record().unwrap() {
        count += 1;
    }
    assert_eq!(count, 10);
}

#[test]
fn test_removal_records_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");

    let mixed = BinlogRecord::new(vec![
        ("keep".to_string(), Some(b"v".to_vec())),
        ("drop".to_string(), None),
    ]);
    BinlogWriter::open(&path, SyncStrategy::EveryWrite)
        .unwrap()
        .append(&mixed)
        .unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    let (rec, _) = expect_record(reader.next_record().unwrap());
    assert_eq!(rec, mixed);
}

#[test]
fn test_torn_tail_reported_as_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");

    let end = {
        let mut writer = BinlogWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        writer.append(&record("a", "1")).unwrap()
    };
    let torn = record("b", "2").encode().unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&torn[..torn.len() - 3]).unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    expect_record(reader.next_record().unwrap());
    match reader.next_record().unwrap() {
        ReadOutcome::Truncated { at } => assert_eq!(at, end),
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn test_partial_header_reported_as_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    std::fs::write(&path, [1u8, 0, 0]).unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    assert!(matches!(
        reader.next_record().unwrap(),
        ReadOutcome::Truncated { at: 0 }
    ));
}

#[test]
fn test_checksum_mismatch_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    BinlogWriter::open(&path, SyncStrategy::EveryWrite)
        .unwrap()
        .append(&record("a", "1"))
        .unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    assert!(matches!(
        reader.next_record(),
        Err(OptiError::BinlogCorruption { offset: 0, .. })
    ));
}

#[test]
fn test_damaged_length_is_corruption_not_truncation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    {
        let mut writer = BinlogWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        writer.append(&record("a", "1")).unwrap();
        writer.append(&record("b", "2")).unwrap();
    }

    // A length pointing past the end would otherwise look like a torn append
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[..4].copy_from_slice(&1000u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = BinlogReader::open(&path, 0).unwrap();
    assert!(matches!(
        reader.next_record(),
        Err(OptiError::BinlogCorruption { offset: 0, .. })
    ));
}

#[test]
fn test_offset_past_end_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binlog");
    let end = BinlogWriter::open(&path, SyncStrategy::EveryWrite)
        .unwrap()
        .append(&record("a", "1"))
        .unwrap();

    assert!(matches!(
        BinlogReader::open(&path, end + 1),
        Err(OptiError::BinlogCorruption { .. })
    ));
}
