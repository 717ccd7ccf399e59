//! Binlog Module
//!
//! Append-only log of applied transaction write maps.
//!
//! ## Responsibilities
//! - Append one record per committed transaction, in application order
//! - CRC32 checksums for corruption detection
//! - Byte offsets as record positions; the dictionary stores the end offset
//!   of the last applied record under [`OFFSET_KEY`]
//! - Replay from that offset on startup
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Record 1                                                │
//! │ ┌─────────┬─────────────┬─────────────┬───────────────┐ │
//! │ │ Len (4) │ Len CRC (4) │ Payload CRC │ Payload (Len) │ │
//! │ │         │             │ (4)         │               │ │
//! │ └─────────┴─────────────┴─────────────┴───────────────┘ │
//! ├─────────────────────────────────────────────────────────┤
//! │ Record 2                                                │
//! │ ┌─────────┬─────────────┬─────────────┬───────────────┐ │
//! │ │ Len (4) │ Len CRC (4) │ Payload CRC │ Payload (Len) │ │
//! │ │         │             │ (4)         │               │ │
//! │ └─────────┴─────────────┴─────────────┴───────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! Payload = bincode-encoded [`BinlogRecord`]. The length carries its own
//! checksum, so a damaged length is corruption rather than a short read. Only
//! a record whose verified header runs past the end of the file, or a header
//! cut short by it, is an uncommitted tail; anything else malformed is
//! corruption.

mod reader;
mod record;
mod replay;
mod writer;

pub use reader::{BinlogReader, ReadOutcome};
pub use record::BinlogRecord;
pub use replay::{replay, stored_offset, ReplayStats};
pub(crate) use replay::apply_record;
pub use writer::BinlogWriter;

/// Reserved dictionary key holding the replay offset as a decimal string
pub const OFFSET_KEY: &str = "__optikv.binlog_offset";

/// Record header: Len (4) + Len CRC (4) + Payload CRC (4)
pub const HEADER_SIZE: usize = 12;

/// Largest payload accepted on replay (64 MB)
pub const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;
