//! Recovery and lifecycle tests
//!
//! These tests verify:
//! - Swap state is rebuilt from the binlog on restart
//! - Disk state survives close/reopen without re-applying records
//! - Disk stacks log to the persistence directory when no binlog is given
//! - A persistence directory can only be opened once at a time
//! - The barrier refuses transactions after shutdown

use std::fs::OpenOptions;
use std::io::Write;

use optikv::binlog::BinlogRecord;
use optikv::lifecycle::DirLock;
use optikv::{Database, EngineKind, OptiError, ShutdownBarrier, SyncStrategy, Transaction};
use tempfile::TempDir;

use super::common::{open, run, small_swap};

#[tokio::test]
async fn test_swap_restart_replays_binlog() {
    let dir = TempDir::new().unwrap();
    let binlog = dir.path().join("binlog");
    let barrier = ShutdownBarrier::new();

    let position = {
        let db = open(small_swap().binlog_path(&binlog).build()).await;
        run(&db, &barrier, Transaction::new("1").write("a", "1").write("b", "1")).await;
        run(&db, &barrier, Transaction::new("2").expect("a", "1").write("a", "2")).await;
        run(&db, &barrier, Transaction::new("3").remove("b").write("c", "3")).await;
        // Rejected and read-only transactions are not logged
        run(&db, &barrier, Transaction::new("4").expect("a", "1").write("a", "x")).await;
        run(&db, &barrier, Transaction::new("5").read("a")).await;
        let position = db.binlog_position().await.unwrap();
        assert_eq!(db.stored_offset().await.unwrap(), position);
        db.close().await.unwrap();
        position
    };

    let db = open(small_swap().binlog_path(&binlog).build()).await;
    let replayed = db.replay_stats();
    assert_eq!(replayed.records_applied, 3);
    assert_eq!(replayed.end_offset, position);

    let outcome = run(
        &db,
        &barrier,
        Transaction::new("check").read("a").read("b").read("c"),
    )
    .await;
    assert_eq!(outcome.value("a"), Some(&b"2"[..]));
    assert_eq!(outcome.value("b"), None);
    assert_eq!(outcome.value("c"), Some(&b"3"[..]));
}

#[tokio::test]
async fn test_disk_reopen_skips_applied_records() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let binlog = dir.path().join("binlog");
    let barrier = ShutdownBarrier::new();
    let config = || {
        small_swap()
            .engine(EngineKind::Disk)
            .data_dir(&data)
            .binlog_path(&binlog)
            .binlog_sync_strategy(SyncStrategy::EveryNEntries { count: 8 })
            .build()
    };

    {
        let db = open(config()).await;
        for i in 0..20 {
            run(
                &db,
                &barrier,
                Transaction::new(i.to_string()).write(format!("k{}", i), i.to_string()),
            )
            .await;
        }
        db.close().await.unwrap();
    }

    let db = open(config()).await;
    assert_eq!(db.replay_stats().records_applied, 0);
    let outcome = run(&db, &barrier, Transaction::new("check").read("k7").read("k19")).await;
    assert_eq!(outcome.value("k7"), Some(&b"7"[..]));
    assert_eq!(outcome.value("k19"), Some(&b"19"[..]));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_disk_recovers_after_unclean_stop() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let binlog = dir.path().join("binlog");
    let barrier = ShutdownBarrier::new();
    let config = || {
        small_swap()
            .engine(EngineKind::Disk)
            .data_dir(&data)
            .binlog_path(&binlog)
            .build()
    };

    {
        let db = open(config()).await;
        run(&db, &barrier, Transaction::new("1").write("a", "1")).await;
        run(&db, &barrier, Transaction::new("2").write("b", "2")).await;
        // Dropped without close: memtables are lost and the lock stays behind
    }
    assert!(matches!(
        Database::open(config()).await,
        Err(OptiError::DirectoryLocked(_))
    ));
    std::fs::remove_file(data.join(DirLock::FILE_NAME)).unwrap();

    let db = open(config()).await;
    assert_eq!(db.replay_stats().records_applied, 2);
    let outcome = run(&db, &barrier, Transaction::new("check").read("a").read("b")).await;
    assert_eq!(outcome.value("a"), Some(&b"1"[..]));
    assert_eq!(outcome.value("b"), Some(&b"2"[..]));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_disk_without_binlog_path_survives_crash() {
    let dir = TempDir::new().unwrap();
    let barrier = ShutdownBarrier::new();
    let config = || {
        small_swap()
            .engine(EngineKind::Disk)
            .data_dir(dir.path())
            .build()
    };
    assert_eq!(config().binlog_file(), Some(dir.path().join("binlog")));

    {
        let db = open(config()).await;
        run(&db, &barrier, Transaction::new("1").write("a", "1")).await;
        assert!(db.binlog_position().await.unwrap() > 0);
    }
    std::fs::remove_file(dir.path().join(DirLock::FILE_NAME)).unwrap();

    let db = open(config()).await;
    assert_eq!(db.replay_stats().records_applied, 1);
    let outcome = run(&db, &barrier, Transaction::new("check").read("a")).await;
    assert_eq!(outcome.value("a"), Some(&b"1"[..]));
    db.close().await.unwrap();

    let swap = small_swap().data_dir(dir.path()).build();
    assert_eq!(swap.binlog_file(), None);
}

#[tokio::test]
async fn test_torn_binlog_tail_discarded_on_open() {
    let dir = TempDir::new().unwrap();
    let binlog = dir.path().join("binlog");
    let barrier = ShutdownBarrier::new();

    {
        let db = open(small_swap().binlog_path(&binlog).build()).await;
        run(&db, &barrier, Transaction::new("1").write("a", "1")).await;
        db.close().await.unwrap();
    }
    let torn = BinlogRecord::new(vec![("b".to_string(), Some(b"2".to_vec()))])
        .encode()
        .unwrap();
    let mut file = OpenOptions::new().append(true).open(&binlog).unwrap();
    file.write_all(&torn[..torn.len() / 2]).unwrap();
    drop(file);

    let db = open(small_swap().binlog_path(&binlog).build()).await;
    let replayed = db.replay_stats();
    assert_eq!(replayed.records_applied, 1);
    assert_eq!(replayed.truncated_bytes, (torn.len() / 2) as u64);

    // New appends land where the torn record started
    assert_eq!(db.binlog_position().await, Some(replayed.end_offset));
    let outcome = run(&db, &barrier, Transaction::new("c").write("c", "3").read("b")).await;
    assert_eq!(outcome.value("b"), None);
}

#[tokio::test]
async fn test_corrupt_binlog_fails_open_and_releases_lock() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let binlog = dir.path().join("binlog");
    let barrier = ShutdownBarrier::new();
    let config = || {
        small_swap()
            .data_dir(&data)
            .binlog_path(&binlog)
            .build()
    };

    {
        let db = open(config()).await;
        run(&db, &barrier, Transaction::new("1").write("a", "1")).await;
        db.close().await.unwrap();
    }
    let mut bytes = std::fs::read(&binlog).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&binlog, &bytes).unwrap();

    assert!(matches!(
        Database::open(config()).await,
        Err(OptiError::BinlogCorruption { .. })
    ));
    assert!(!data.join(DirLock::FILE_NAME).exists());
}

#[tokio::test]
async fn test_directory_claimed_once() {
    let dir = TempDir::new().unwrap();
    let config = || {
        small_swap()
            .engine(EngineKind::Disk)
            .data_dir(dir.path())
            .build()
    };

    let first = open(config()).await;
    assert!(matches!(
        Database::open(config()).await,
        Err(OptiError::DirectoryLocked(_))
    ));

    first.close().await.unwrap();
    first.close().await.unwrap();

    let second = open(config()).await;
    second.close().await.unwrap();
}

#[tokio::test]
async fn test_disk_engine_requires_directory() {
    let result = Database::open(small_swap().engine(EngineKind::Disk).build()).await;
    assert!(matches!(result, Err(OptiError::Config(_))));
}

#[tokio::test]
async fn test_barrier_refuses_after_shutdown() {
    let db = open(small_swap().build()).await;
    let barrier = ShutdownBarrier::new();
    run(&db, &barrier, Transaction::new("1").write("a", "1")).await;

    barrier.shutdown().await;

    let refused = barrier.enter().await;
    assert!(matches!(refused, Err(ref e) if e.is_unavailable()));
    assert_eq!(db.stats().accepted, 1);
}
