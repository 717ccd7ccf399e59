//! Binlog record definitions

use serde::{Deserialize, Serialize};

use crate::dict::Value;
use crate::error::{OptiError, Result};

use super::{HEADER_SIZE, MAX_RECORD_SIZE};

/// The write map of one committed transaction
///
/// `None` values are removals. Entries are kept in the order they were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogRecord {
    pub writes: Vec<(String, Option<Value>)>,
}

impl BinlogRecord {
    pub fn new(writes: Vec<(String, Option<Value>)>) -> Self {
        Self { writes }
    }

    /// Framed bytes: [len][crc(len)][crc(payload)][payload]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() > MAX_RECORD_SIZE as usize {
            return Err(OptiError::BinlogWrite(format!(
                "record of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_RECORD_SIZE
            )));
        }

        let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
        let len = (payload.len() as u32).to_le_bytes();
        framed.extend_from_slice(&len);
        framed.extend_from_slice(&crc32fast::hash(&len).to_le_bytes());
        framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        framed.extend_from_slice(&payload);
        Ok(framed)
    }

    /// Decode a payload whose checksum has already been verified
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}
