//! # OptiKV
//!
//! A key-value store with atomic multi-key optimistic transactions:
//! - Conditions checked and writes applied under per-shard async locks
//! - Binlog of applied write maps with replay on restart
//! - Swap allocator with young/old generations for off-heap values
//! - Bounded caches with random eviction over swap or disk
//! - Graceful shutdown through a reader/writer barrier
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │           (task per connection, task per request)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  permit from ShutdownBarrier
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Database::execute                         │
//! │        lock shards → check conditions → write + log         │
//! └─────────────────────┬──────────────────────────┬────────────┘
//!                       │                          │
//!                       ▼                          ▼
//!             ┌──────────────────┐          ┌─────────────┐
//!             │ShardedDictionary │          │   Binlog    │
//!             │  (async mutexes) │          │  (Append)   │
//!             └────────┬─────────┘          └─────────────┘
//!        ┌─────────────┼──────────────┐
//!        ▼             ▼              ▼
//!  ┌───────────┐ ┌───────────┐ ┌─────────────┐
//!  │  Enhanced │ │   Cache   │ │    Disk     │
//!  │  (swap)   │ │ WT / Flush│ │ (SSTables)  │
//!  └─────┬─────┘ └───────────┘ └─────────────┘
//!        ▼
//!  ┌─────────────────────┐
//!  │GenerationalAllocator│
//!  └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod binlog;
pub mod cache;
pub mod dict;
pub mod engine;
pub mod lifecycle;
pub mod memtable;
pub mod network;
pub mod protocol;
pub mod storage;
pub mod swap;
pub mod txn;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, EngineKind, SyncStrategy};
pub use engine::{Database, EngineStats};
pub use error::{OptiError, Result};
pub use lifecycle::{Permit, Shutdown, ShutdownBarrier};
pub use txn::{Transaction, TxnOutcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of OptiKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
