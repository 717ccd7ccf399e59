//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

use super::{le_u32, HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Start of the index block
    end_offset: u64,
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(file: &'a mut BufReader<File>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = le_u32(&header, 0)? as usize;
        let val_len = le_u32(&header, 4)?;

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        self.current_offset += 8 + key_len as u64;

        if val_len == TOMBSTONE_MARKER {
            return Ok((key, None));
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        self.current_offset += val_len as u64;
        Ok((key, Some(value)))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    /// (key, Option<value>); a None value is a tombstone
    type Item = Result<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }
        Some(self.read_entry())
    }
}
