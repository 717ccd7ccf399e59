//! Storage Module
//!
//! Persistent storage layer of the disk engine, one instance per shard.
//!
//! ## Responsibilities
//! - Persist memtable snapshots to disk in sorted format
//! - Point lookups newest → oldest with tombstone shadowing
//! - Compaction once a shard accumulates too many tables

mod manager;
mod sstable;

pub use manager::{StorageManager, COMPACTION_THRESHOLD};
pub use sstable::{Lookup, SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
