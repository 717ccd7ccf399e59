//! Tests for the generational allocator
//!
//! These tests verify:
//! - New blobs land in the young generation
//! - Ripe blobs move to the old generation on read
//! - A full old generation defers promotion without failing the read

use std::time::Duration;

use optikv::swap::{BucketAllocator, GenerationalAllocator, SwapAllocator, Tier};

fn generational(old_capacity: usize, delay: Duration) -> GenerationalAllocator {
    GenerationalAllocator::new(
        Box::new(BucketAllocator::new(2, 1024).unwrap()),
        Box::new(BucketAllocator::new(1, old_capacity).unwrap()),
        delay,
    )
}

#[test]
fn test_allocate_lands_young() {
    let allocator = generational(1024, Duration::from_secs(60));

    let mut handle = allocator.allocate(b"fresh").unwrap();

    assert_eq!(handle.tier(), Tier::Young);
    assert_eq!(allocator.read(&mut handle).unwrap(), b"fresh".to_vec());
    assert_eq!(handle.tier(), Tier::Young);
    assert_eq!(allocator.young_stats().live, 1);
    assert_eq!(allocator.old_stats().live, 0);
}

#[test]
fn test_ripe_read_promotes() {
    let allocator = generational(1024, Duration::from_millis(20));
    let mut handle = allocator.allocate(b"survivor").unwrap();
    let young_before = allocator.young_stats();

    std::thread::sleep(Duration::from_millis(40));
    let bytes = allocator.read(&mut handle).unwrap();

    assert_eq!(bytes, b"survivor".to_vec());
    assert_eq!(handle.tier(), Tier::Old);
    assert_eq!(allocator.promotions(), 1);

    let young_after = allocator.young_stats();
    let old_after = allocator.old_stats();
    assert_eq!(young_before.live - young_after.live, 1);
    assert_eq!(young_before.used_bytes - young_after.used_bytes, 8);
    assert_eq!(old_after.live, 1);
    assert_eq!(old_after.used_bytes, 8);

    // Served from old from now on
    assert_eq!(allocator.read(&mut handle).unwrap(), b"survivor".to_vec());
    assert_eq!(allocator.promotions(), 1);

    allocator.free(handle).unwrap();
    assert_eq!(allocator.old_stats().live, 0);
}

#[test]
fn test_full_old_generation_keeps_blob_young() {
    let allocator = generational(4, Duration::ZERO);
    let mut handle = allocator.allocate(b"too big for old").unwrap();

    let bytes = allocator.read(&mut handle).unwrap();

    assert_eq!(bytes, b"too big for old".to_vec());
    assert_eq!(handle.tier(), Tier::Young);
    assert_eq!(allocator.promotions(), 0);
    assert_eq!(allocator.young_stats().live, 1);
}

#[test]
fn test_free_before_promotion_releases_young() {
    let allocator = generational(1024, Duration::from_secs(60));
    let handle = allocator.allocate(b"short lived").unwrap();

    allocator.free(handle).unwrap();

    assert_eq!(allocator.stats().live, 0);
}
