//! Tests for the lazy fan-out backing store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use optikv::cache::LazyFanout;
use optikv::dict::{Dictionary, MemoryDictionary};
use optikv::OptiError;

#[tokio::test]
async fn test_slots_built_on_first_write() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let mut fanout = LazyFanout::new(4, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryDictionary::new())
    })
    .unwrap();

    assert_eq!(fanout.read("k").await.unwrap(), None);
    fanout.remove("k").await.unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    fanout.write("k", b"v".to_vec()).await.unwrap();
    fanout.write("k", b"w".to_vec()).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(fanout.materialized(), 1);
    assert_eq!(fanout.read("k").await.unwrap(), Some(b"w".to_vec()));
}

#[tokio::test]
async fn test_width_bounds_materialized_slots() {
    let mut fanout = LazyFanout::new(3, |_| Ok(MemoryDictionary::new())).unwrap();

    for i in 0..100 {
        fanout.write(&format!("k{}", i), b"v".to_vec()).await.unwrap();
    }

    assert!(fanout.materialized() <= 3);
    for i in 0..100 {
        assert_eq!(fanout.read(&format!("k{}", i)).await.unwrap(), Some(b"v".to_vec()));
    }
}

#[tokio::test]
async fn test_factory_error_fails_write() {
    let mut fanout: LazyFanout<MemoryDictionary> =
        LazyFanout::new(2, |_| Err(OptiError::Storage("no backing".to_string()))).unwrap();

    assert!(fanout.write("k", b"v".to_vec()).await.is_err());
    assert_eq!(fanout.materialized(), 0);
}

#[test]
fn test_zero_width_rejected() {
    let result = LazyFanout::new(0, |_| Ok(MemoryDictionary::new()));
    assert!(matches!(result, Err(OptiError::Config(_))));
}
