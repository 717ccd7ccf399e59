//! Tests for the sharded dictionary
//!
//! These tests verify:
//! - Stable routing and single-key access
//! - Multi-shard guards only touch the shards they hold
//! - Check-then-write under a guard is atomic per shard
//! - Opposite lock orders do not deadlock

use std::sync::Arc;
use std::time::Duration;

use optikv::dict::{Dictionary, MemoryDictionary, ShardedDictionary};
use optikv::OptiError;

fn memory_shards(count: usize) -> ShardedDictionary {
    let shards: Vec<Box<dyn Dictionary>> = (0..count)
        .map(|_| Box::new(MemoryDictionary::new()) as Box<dyn Dictionary>)
        .collect();
    ShardedDictionary::new(shards).unwrap()
}

/// Two keys owned by different shards
fn keys_on_distinct_shards(dict: &ShardedDictionary) -> (String, String) {
    let first = "key-0".to_string();
    let owner = dict.shard_for(&first);
    let second = (1..)
        .map(|i| format!("key-{}", i))
        .find(|k| dict.shard_for(k) != owner)
        .unwrap();
    (first, second)
}

#[test]
fn test_zero_shards_rejected() {
    assert!(matches!(
        ShardedDictionary::new(Vec::new()),
        Err(OptiError::Config(_))
    ));
}

#[tokio::test]
async fn test_routing_is_stable() {
    let dict = memory_shards(8);

    dict.write("alpha", b"1".to_vec()).await.unwrap();

    assert_eq!(dict.shard_for("alpha"), dict.shard_for("alpha"));
    assert!(dict.shard_for("alpha") < dict.shard_count());
    assert_eq!(dict.read("alpha").await.unwrap(), Some(b"1".to_vec()));

    dict.remove("alpha").await.unwrap();
    assert_eq!(dict.read("alpha").await.unwrap(), None);
}

#[tokio::test]
async fn test_guard_holds_only_requested_shards() {
    let dict = memory_shards(8);
    let (held, other) = keys_on_distinct_shards(&dict);

    let mut guard = dict.lock([held.as_str(), held.as_str()]).await;

    assert_eq!(guard.len(), 1);
    guard.write(&held, b"v".to_vec()).await.unwrap();
    assert!(matches!(
        guard.write(&other, b"v".to_vec()).await,
        Err(OptiError::Storage(_))
    ));
}

#[tokio::test]
async fn test_guard_apply_none_removes() {
    let dict = memory_shards(4);
    dict.write("k", b"v".to_vec()).await.unwrap();

    let mut guard = dict.lock(["k"]).await;
    guard.apply("k", None).await.unwrap();
    drop(guard);

    assert_eq!(dict.read("k").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_check_then_write_is_atomic() {
    let dict = Arc::new(memory_shards(4));
    dict.write("counter", b"0".to_vec()).await.unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let dict = Arc::clone(&dict);
            tokio::spawn(async move {
                let mut guard = dict.lock(["counter"]).await;
                let current: u64 = String::from_utf8(guard.read("counter").await.unwrap().unwrap())
                    .unwrap()
                    .parse()
                    .unwrap();
                tokio::task::yield_now().await;
                guard
                    .write("counter", (current + 1).to_string().into_bytes())
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(dict.read("counter").await.unwrap(), Some(b"32".to_vec()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_key_orders_do_not_deadlock() {
    let dict = Arc::new(memory_shards(8));
    let (a, b) = keys_on_distinct_shards(&dict);

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let dict = Arc::clone(&dict);
            let (first, second) = if i % 2 == 0 {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            tokio::spawn(async move {
                let mut guard = dict.lock([first.as_str(), second.as_str()]).await;
                guard.write(&first, b"x".to_vec()).await.unwrap();
                tokio::task::yield_now().await;
                guard.write(&second, b"y".to_vec()).await.unwrap();
            })
        })
        .collect();

    let all = async {
        for task in tasks {
            task.await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(10), all)
        .await
        .expect("lock ordering deadlocked");
}

#[tokio::test]
async fn test_flush_defers_named_shard() {
    let dict = memory_shards(4);
    let mut guard = dict.lock_all().await;

    assert_eq!(guard.len(), 4);
    assert!(!guard.needs_flush());
    guard.flush(Some("anything")).await.unwrap();
}
