//! Binlog replay
//!
//! Brings a dictionary up to date with the log before any query is served.

use std::fs::OpenOptions;
use std::iter;
use std::path::Path;

use crate::dict::ShardedDictionary;
use crate::error::{OptiError, Result};

use super::{BinlogReader, BinlogRecord, ReadOutcome, OFFSET_KEY};

/// Result of a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Offset read from the dictionary
    pub start_offset: u64,

    /// Offset after the last applied record
    pub end_offset: u64,

    /// Records applied by this run
    pub records_applied: u64,

    /// Bytes of incomplete tail discarded
    pub truncated_bytes: u64,
}

/// Read the replay offset stored in the dictionary (absent = 0)
pub async fn stored_offset(dict: &ShardedDictionary) -> Result<u64> {
    match dict.read(OFFSET_KEY).await? {
        None => Ok(0),
        Some(bytes) => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| OptiError::BinlogCorruption {
                offset: 0,
                reason: format!("stored replay offset {:?} is not a decimal integer", bytes),
            }),
    }
}

/// Apply one record and advance the stored offset to `end`
pub(crate) async fn apply_record(
    dict: &ShardedDictionary,
    record: BinlogRecord,
    end: u64,
) -> Result<()> {
    let mut guard = dict
        .lock(
            record
                .writes
                .iter()
                .map(|(key, _)| key.as_str())
                .chain(iter::once(OFFSET_KEY)),
        )
        .await;

    for (key, value) in record.writes {
        guard.apply(&key, value).await?;
    }
    guard
        .write(OFFSET_KEY, end.to_string().into_bytes())
        .await?;

    let wants_checkpoint = guard.needs_flush();
    drop(guard);
    if wants_checkpoint {
        dict.checkpoint(Some(OFFSET_KEY)).await?;
    }
    Ok(())
}

/// Replay every record after the stored offset
///
/// Re-running replay on an up-to-date dictionary applies nothing. A record cut
/// off by the end of the file is discarded and the file is truncated to the
/// last whole record; any other damage aborts startup.
pub async fn replay(path: &Path, dict: &ShardedDictionary) -> Result<ReplayStats> {
    let start_offset = stored_offset(dict).await?;
    let mut stats = ReplayStats {
        start_offset,
        end_offset: start_offset,
        ..ReplayStats::default()
    };

    if !path.exists() {
        if start_offset > 0 {
            return Err(OptiError::BinlogCorruption {
                offset: start_offset,
                reason: format!("{} is missing", path.display()),
            });
        }
        return Ok(stats);
    }

    let mut reader = BinlogReader::open(path, start_offset)?;
    loop {
        match reader.next_record()? {
            ReadOutcome::Record { record, end } => {
                apply_record(dict, record, end).await?;
                stats.records_applied += 1;
                stats.end_offset = end;
            }
            ReadOutcome::Truncated { at } => {
                let file = OpenOptions::new().write(true).open(path)?;
                let len = file.metadata()?.len();
                file.set_len(at)?;
                file.sync_all()?;
                stats.truncated_bytes = len - at;
                tracing::warn!(
                    "Discarded {} bytes of incomplete binlog tail at offset {}",
                    stats.truncated_bytes,
                    at
                );
                break;
            }
            ReadOutcome::End => break,
        }
    }

    tracing::info!(
        "Binlog replay: {} records applied, offset {} -> {}",
        stats.records_applied,
        stats.start_offset,
        stats.end_offset
    );
    Ok(stats)
}
