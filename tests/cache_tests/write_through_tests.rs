//! Tests for the write-through cache
//!
//! These tests verify:
//! - Writes reach the backing store before returning
//! - Misses are filled from the backing store
//! - Random eviction keeps the footprint under the soft limit without loss
//! - A failed backing write leaves the cache untouched

use optikv::cache::WriteThroughCache;
use optikv::dict::Dictionary;

use super::common::SharedMap;

#[tokio::test]
async fn test_write_reaches_backing_immediately() {
    let backing = SharedMap::new();
    let mut cache = WriteThroughCache::new(backing.clone(), 1024 * 1024);

    cache.write("k", b"v".to_vec()).await.unwrap();
    assert_eq!(backing.get("k"), Some(b"v".to_vec()));

    cache.remove("k").await.unwrap();
    assert_eq!(backing.get("k"), None);
    assert_eq!(cache.read("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_miss_then_hit() {
    let mut backing = SharedMap::new();
    backing.write("warm", b"1".to_vec()).await.unwrap();
    let mut cache = WriteThroughCache::new(backing, 1024 * 1024);

    assert_eq!(cache.read("warm").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(cache.read("warm").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(cache.read("cold").await.unwrap(), None);
    assert_eq!(cache.read("cold").await.unwrap(), None);

    let stats = cache.stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_eviction_respects_soft_limit_without_loss() {
    let backing = SharedMap::new();
    let mut cache = WriteThroughCache::new(backing.clone(), 1000);

    for i in 0..50 {
        cache.write(&format!("key-{:02}", i), vec![i as u8; 100]).await.unwrap();
        assert!(cache.resident_bytes() <= 1000);
    }

    assert!(cache.stats().evictions > 0);
    assert!(cache.resident_len() < 50);
    assert_eq!(backing.len(), 50);

    for i in 0..50 {
        let value = cache.read(&format!("key-{:02}", i)).await.unwrap();
        assert_eq!(value, Some(vec![i as u8; 100]));
    }
}

#[tokio::test]
async fn test_failed_backing_write_not_cached() {
    let mut cache = WriteThroughCache::new(SharedMap::failing(), 1024 * 1024);

    assert!(cache.write("k", b"v".to_vec()).await.is_err());

    assert_eq!(cache.resident_len(), 0);
    assert_eq!(cache.read("k").await.unwrap(), None);
}
