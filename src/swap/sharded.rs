//! Sharded swap allocator
//!
//! Composes several allocators behind one interface to widen lock parallelism.
//! Semantics are identical to a single allocator.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{OptiError, Result};

use super::{BucketAllocator, SwapAllocator, SwapHandle, SwapStats};

/// Round-robins allocations over inner allocators; the shard index travels in
/// the handle so reads and frees go back to the owner.
pub struct ShardedAllocator<A = BucketAllocator> {
    shards: Vec<A>,
    next: AtomicUsize,
}

impl ShardedAllocator<BucketAllocator> {
    /// Build `shards` bucket allocators of identical geometry
    pub fn with_buckets(shards: usize, buckets: usize, bucket_capacity: usize) -> Result<Self> {
        let inner = (0..shards)
            .map(|_| BucketAllocator::new(buckets, bucket_capacity))
            .collect::<Result<Vec<_>>>()?;
        Self::new(inner)
    }
}

impl<A: SwapAllocator> ShardedAllocator<A> {
    pub fn new(shards: Vec<A>) -> Result<Self> {
        if shards.is_empty() || shards.len() > u16::MAX as usize {
            return Err(OptiError::Config(format!(
                "sharded allocator needs 1..={} shards, got {}",
                u16::MAX,
                shards.len()
            )));
        }
        Ok(Self {
            shards,
            next: AtomicUsize::new(0),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn owner(&self, handle: &SwapHandle) -> Result<&A> {
        self.shards.get(handle.shard as usize).ok_or_else(|| {
            OptiError::InvalidHandle(format!("allocator shard {} does not exist", handle.shard))
        })
    }
}

impl<A: SwapAllocator> SwapAllocator for ShardedAllocator<A> {
    fn allocate(&self, bytes: &[u8]) -> Result<SwapHandle> {
        let count = self.shards.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % count;

        let mut last_err = None;
        for step in 0..count {
            let index = (start + step) % count;
            match self.shards[index].allocate(bytes) {
                Ok(mut handle) => {
                    handle.shard = index as u16;
                    return Ok(handle);
                }
                Err(e @ OptiError::SwapExhausted { .. }) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(OptiError::SwapExhausted {
            requested: bytes.len(),
        }))
    }

    fn read(&self, handle: &mut SwapHandle) -> Result<Vec<u8>> {
        let shard = handle.shard;
        let bytes = self.owner(handle)?.read(handle)?;
        handle.shard = shard;
        Ok(bytes)
    }

    fn free(&self, handle: SwapHandle) -> Result<()> {
        self.owner(&handle)?.free(handle)
    }

    fn stats(&self) -> SwapStats {
        self.shards
            .iter()
            .fold(SwapStats::default(), |acc, shard| acc.merge(shard.stats()))
    }
}
