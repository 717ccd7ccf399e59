//! Bucketed swap allocator
//!
//! The leaf allocator: a fixed set of buckets, each behind its own lock.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{OptiError, Result};

use super::bucket::Bucket;
use super::{SwapAllocator, SwapHandle, SwapStats, Tier};

/// Allocator over `N` fixed-capacity buckets
///
/// ## Concurrency:
/// - Each bucket is a `parking_lot::Mutex`; operations on different buckets
///   never contend
/// - `next_id`: atomic counter hashed to pick the first bucket to try
pub struct BucketAllocator {
    buckets: Vec<Mutex<Bucket>>,
    next_id: AtomicU64,
    bucket_capacity: usize,
}

impl BucketAllocator {
    /// Create an allocator with `bucket_count` arenas of `bucket_capacity` bytes
    pub fn new(bucket_count: usize, bucket_capacity: usize) -> Result<Self> {
        if bucket_count == 0 || bucket_capacity == 0 {
            return Err(OptiError::Config(
                "swap allocator needs at least one non-empty bucket".to_string(),
            ));
        }

        let buckets = (0..bucket_count)
            .map(|_| Bucket::new(bucket_capacity).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            buckets,
            next_id: AtomicU64::new(0),
            bucket_capacity,
        })
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, handle: &SwapHandle) -> Result<&Mutex<Bucket>> {
        self.buckets.get(handle.bucket as usize).ok_or_else(|| {
            OptiError::InvalidHandle(format!("bucket {} does not exist", handle.bucket))
        })
    }
}

impl SwapAllocator for BucketAllocator {
    fn allocate(&self, bytes: &[u8]) -> Result<SwapHandle> {
        if bytes.len() > self.bucket_capacity {
            return Err(OptiError::SwapExhausted {
                requested: bytes.len(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = self.buckets.len();
        let start = (mix(id) % count as u64) as usize;

        // Chosen bucket first, then probe the rest before giving up
        for step in 0..count {
            let index = (start + step) % count;
            let placed = self.buckets[index].lock().place(bytes);

            if let Some((slot, stamp)) = placed {
                return Ok(SwapHandle {
                    tier: Tier::Young,
                    shard: 0,
                    bucket: index as u32,
                    slot,
                    stamp,
                    born_ms: 0,
                    len: bytes.len(),
                });
            }
        }

        Err(OptiError::SwapExhausted {
            requested: bytes.len(),
        })
    }

    fn read(&self, handle: &mut SwapHandle) -> Result<Vec<u8>> {
        self.bucket(handle)?.lock().read(handle.slot, handle.stamp)
    }

    fn free(&self, handle: SwapHandle) -> Result<()> {
        self.bucket(&handle)?
            .lock()
            .release(handle.slot, handle.stamp)
            .map(|_| ())
    }

    fn stats(&self) -> SwapStats {
        self.buckets.iter().fold(SwapStats::default(), |acc, bucket| {
            let bucket = bucket.lock();
            acc.merge(SwapStats {
                live: bucket.live(),
                used_bytes: bucket.used(),
                capacity_bytes: bucket.capacity(),
            })
        })
    }
}

/// splitmix64 finalizer: stable spread of sequential ids over buckets
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
