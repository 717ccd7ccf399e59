//! Swap Allocator Module
//!
//! Stores serialized values outside the live heap, addressed by opaque handles.
//!
//! ## Responsibilities
//! - Place byte blobs into fixed-capacity buckets (anonymous memory maps)
//! - Validate every access against a generation-stamped slot table
//! - Widen lock parallelism by sharding allocators
//! - Promote long-lived blobs from a young to an old allocator
//!
//! ## Layering
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           GenerationalAllocator              │
//! │   allocate → young      read → maybe promote │
//! ├───────────────────────┬──────────────────────┤
//! │  ShardedAllocator     │  ShardedAllocator    │
//! │  (young)              │  (old)               │
//! ├───────────────────────┼──────────────────────┤
//! │  BucketAllocator × N  │  BucketAllocator × N │
//! │  ┌──────┬──────┬───┐  │                      │
//! │  │Bkt 0 │Bkt 1 │...│  │                      │
//! │  └──────┴──────┴───┘  │                      │
//! └───────────────────────┴──────────────────────┘
//! ```

mod allocator;
mod bucket;
mod generational;
mod sharded;

pub use allocator::BucketAllocator;
pub use generational::GenerationalAllocator;
pub use sharded::ShardedAllocator;

use crate::error::Result;

/// Which generation currently backs a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Young,
    Old,
}

/// Opaque reference to a blob stored by a [`SwapAllocator`]
///
/// A handle is owned by exactly one dictionary entry. It is invalid once
/// freed; the stamp makes a stale copy fail instead of reading a reused slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapHandle {
    pub(crate) tier: Tier,
    pub(crate) shard: u16,
    pub(crate) bucket: u32,
    pub(crate) slot: u32,
    pub(crate) stamp: u32,
    /// Milliseconds since the generational allocator's epoch
    pub(crate) born_ms: u64,
    pub(crate) len: usize,
}

impl SwapHandle {
    /// Generation currently backing this handle
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Size of the referenced blob in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Occupancy snapshot of an allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    /// Number of live handles
    pub live: usize,

    /// Bytes currently held by live blobs
    pub used_bytes: usize,

    /// Total arena bytes across all buckets
    pub capacity_bytes: usize,
}

impl SwapStats {
    pub(crate) fn merge(self, other: SwapStats) -> SwapStats {
        SwapStats {
            live: self.live + other.live,
            used_bytes: self.used_bytes + other.used_bytes,
            capacity_bytes: self.capacity_bytes + other.capacity_bytes,
        }
    }
}

/// Handle-based blob storage
///
/// Implementations serialize per bucket; all methods take `&self`.
pub trait SwapAllocator: Send + Sync {
    /// Store a copy of `bytes` and return its handle
    fn allocate(&self, bytes: &[u8]) -> Result<SwapHandle>;

    /// Read the blob behind `handle`
    ///
    /// The allocator may relocate the blob (generational promotion), in which
    /// case `handle` is rebound to the new location.
    fn read(&self, handle: &mut SwapHandle) -> Result<Vec<u8>>;

    /// Release the blob behind `handle`
    fn free(&self, handle: SwapHandle) -> Result<()>;

    /// Current occupancy
    fn stats(&self) -> SwapStats;
}
