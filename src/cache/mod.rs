//! Cache Module
//!
//! Bounded-memory layers stacked on a backing [`Dictionary`](crate::dict::Dictionary).
//!
//! ## Variants
//! - [`WriteThroughCache`]: writes reach the backing store before the call
//!   returns; eviction only costs locality
//! - [`FlushingCache`]: writes mark entries dirty; dirty entries reach the
//!   backing store on pressure, on `maintain`, or on `flush`
//!
//! Both keep their footprint under a soft limit by evicting uniformly random
//! resident entries. The limit is a budget, not a cap: an insert may overshoot
//! until the eviction loop that follows it runs.

mod flushing;
mod lazy;
mod resident;
mod write_through;

pub use flushing::FlushingCache;
pub use lazy::LazyFanout;
pub use write_through::WriteThroughCache;

use std::time::Instant;

use crate::dict::{Value, ENTRY_OVERHEAD};

/// One resident cache line; `value: None` caches absence (or a pending removal)
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub(crate) value: Option<Value>,
    pub(crate) dirty: bool,
    pub(crate) touched: Instant,
}

impl CacheEntry {
    pub(crate) fn clean(value: Option<Value>) -> Self {
        Self {
            value,
            dirty: false,
            touched: Instant::now(),
        }
    }

    pub(crate) fn dirty(value: Option<Value>) -> Self {
        Self {
            value,
            dirty: true,
            touched: Instant::now(),
        }
    }
}

/// Estimated resident cost of an entry
pub(crate) fn entry_cost(key: &str, value: &Option<Value>) -> usize {
    key.len() + value.as_ref().map_or(0, Vec::len) + ENTRY_OVERHEAD
}

/// Counters shared by both cache variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
}
