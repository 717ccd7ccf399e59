//! Generational swap allocator
//!
//! New blobs land in a young allocator sized for churn. A blob that survives
//! `promotion_delay` is moved to the old allocator the next time it is read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;

use super::{SwapAllocator, SwapHandle, SwapStats, Tier};

/// Young/old allocator pair with promotion on access
pub struct GenerationalAllocator {
    young: Box<dyn SwapAllocator>,
    old: Box<dyn SwapAllocator>,
    promotion_delay: Duration,
    epoch: Instant,
    promotions: AtomicU64,
}

impl GenerationalAllocator {
    pub fn new(
        young: Box<dyn SwapAllocator>,
        old: Box<dyn SwapAllocator>,
        promotion_delay: Duration,
    ) -> Self {
        Self {
            young,
            old,
            promotion_delay,
            epoch: Instant::now(),
            promotions: AtomicU64::new(0),
        }
    }

    /// Occupancy of the young generation
    pub fn young_stats(&self) -> SwapStats {
        self.young.stats()
    }

    /// Occupancy of the old generation
    pub fn old_stats(&self) -> SwapStats {
        self.old.stats()
    }

    /// Number of successful promotions since creation
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn is_ripe(&self, handle: &SwapHandle) -> bool {
        handle.tier == Tier::Young
            && self.now_ms().saturating_sub(handle.born_ms) >= self.promotion_delay.as_millis() as u64
    }

    /// Copy a ripe young blob into old and rebind the handle
    ///
    /// Returns the bytes either way; a full old generation leaves the blob young.
    fn promote(&self, handle: &mut SwapHandle) -> Result<Vec<u8>> {
        let bytes = self.young.read(handle)?;

        let mut relocated = match self.old.allocate(&bytes) {
            Ok(relocated) => relocated,
            Err(e) => {
                tracing::warn!("Promotion of {} bytes deferred: {}", bytes.len(), e);
                return Ok(bytes);
            }
        };
        relocated.tier = Tier::Old;
        relocated.born_ms = handle.born_ms;

        let young = std::mem::replace(handle, relocated);
        self.young.free(young)?;
        self.promotions.fetch_add(1, Ordering::Relaxed);

        Ok(bytes)
    }
}

impl SwapAllocator for GenerationalAllocator {
    fn allocate(&self, bytes: &[u8]) -> Result<SwapHandle> {
        let mut handle = self.young.allocate(bytes)?;
        handle.tier = Tier::Young;
        handle.born_ms = self.now_ms();
        Ok(handle)
    }

    fn read(&self, handle: &mut SwapHandle) -> Result<Vec<u8>> {
        if self.is_ripe(handle) {
            return self.promote(handle);
        }

        match handle.tier {
            Tier::Young => self.young.read(handle),
            Tier::Old => self.old.read(handle),
        }
    }

    fn free(&self, handle: SwapHandle) -> Result<()> {
        match handle.tier {
            Tier::Young => self.young.free(handle),
            Tier::Old => self.old.free(handle),
        }
    }

    fn stats(&self) -> SwapStats {
        self.young.stats().merge(self.old.stats())
    }
}
