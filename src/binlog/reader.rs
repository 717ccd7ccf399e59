//! Binlog Reader
//!
//! Sequential forward reads from a byte offset.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{OptiError, Result};

use super::{BinlogRecord, HEADER_SIZE, MAX_RECORD_SIZE};

/// Result of reading the next record
#[derive(Debug)]
pub enum ReadOutcome {
    /// A whole, verified record ending at `end`
    Record { record: BinlogRecord, end: u64 },

    /// The file ends inside a record starting at `at`
    Truncated { at: u64 },

    /// Clean end of file
    End,
}

/// Reads records from the binlog, never seeking backwards
pub struct BinlogReader {
    reader: BufReader<File>,
    position: u64,
    file_len: u64,
}

impl BinlogReader {
    /// Open `path` positioned at `offset`
    ///
    /// An offset past the end of the file means the dictionary claims records
    /// the log does not have, which is treated as corruption.
    pub fn open(path: &Path, offset: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if offset > file_len {
            return Err(OptiError::BinlogCorruption {
                offset,
                reason: format!("replay offset is past the end of the log ({} bytes)", file_len),
            });
        }
        file.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            reader: BufReader::new(file),
            position: offset,
            file_len,
        })
    }

    /// Current byte position (start of the next record)
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn next_record(&mut self) -> Result<ReadOutcome> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(ReadOutcome::End);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(ReadOutcome::Truncated { at: self.position });
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let len_bytes = [header[0], header[1], header[2], header[3]];
        let len_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        if crc32fast::hash(&len_bytes) != len_crc {
            return Err(OptiError::BinlogCorruption {
                offset: self.position,
                reason: "length checksum mismatch".to_string(),
            });
        }
        let len = u32::from_le_bytes(len_bytes);
        if len > MAX_RECORD_SIZE {
            return Err(OptiError::BinlogCorruption {
                offset: self.position,
                reason: format!("record length {} exceeds limit {}", len, MAX_RECORD_SIZE),
            });
        }
        // Verified header, short payload: the append was torn
        if remaining < (HEADER_SIZE as u64) + len as u64 {
            return Ok(ReadOutcome::Truncated { at: self.position });
        }

        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;

        if crc32fast::hash(&payload) != crc {
            return Err(OptiError::BinlogCorruption {
                offset: self.position,
                reason: "checksum mismatch".to_string(),
            });
        }

        let record = BinlogRecord::decode(&payload).map_err(|e| OptiError::BinlogCorruption {
            offset: self.position,
            reason: e.to_string(),
        })?;

        self.position += HEADER_SIZE as u64 + len as u64;
        Ok(ReadOutcome::Record {
            record,
            end: self.position,
        })
    }
}
