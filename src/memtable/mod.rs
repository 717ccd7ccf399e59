//! MemTable Module
//!
//! In-memory buffer of recent writes for the disk engine.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Tombstones so removals shadow older SSTable values
//! - Track size for checkpoint triggers
//! - Ordered iteration for SSTable creation
//!
//! ## Data Structure Choice
//! Plain BTreeMap with a running size:
//! - Ordered keys (required for SSTable generation)
//! - No interior locking; the owning shard's lock serializes readers,
//!   writers and flushes

mod table;

pub use table::MemTable;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (removed key)
    Tombstone,
}
