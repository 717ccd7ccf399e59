//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{OptiError, Result};

use super::iterator::SSTableIterator;
use super::{le_u16, le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Outcome of a point lookup in one SSTable
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Key present with a value
    Found(Vec<u8>),
    /// Key present as a tombstone: older tables must not be consulted
    Tombstone,
    /// Key not in this table
    Absent,
}

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    pub(super) file: BufReader<File>,
    /// key → file offset of its entry
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    pub(super) index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable, verify its data checksum and load the index
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(OptiError::Storage(format!(
                "SSTable {} is too small ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(OptiError::Storage(format!(
                "Invalid SSTable magic in {}: {:?}",
                path.display(),
                &header[0..4]
            )));
        }
        let version = le_u16(&header, 4)?;
        if version != VERSION {
            return Err(OptiError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }
        let entry_count = le_u64(&header, 6)?;

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let index_offset = le_u64(&footer, 0)?;
        let expected_crc = le_u32(&footer, 8)?;

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(OptiError::Storage(format!(
                "SSTable {} has index offset {} outside the file",
                path.display(),
                index_offset
            )));
        }

        // Data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != expected_crc {
            return Err(OptiError::Storage(format!(
                "SSTable {} data checksum mismatch",
                path.display()
            )));
        }

        // Index block: [key_len(4)][offset(8)][key]
        let mut index_data = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            let key_len = le_u32(&index_data, pos)? as usize;
            let offset = le_u64(&index_data, pos + 4)?;
            pos += 12;
            let key = index_data
                .get(pos..pos + key_len)
                .ok_or_else(|| OptiError::Storage("Truncated SSTable index".to_string()))?
                .to_vec();
            pos += key_len;
            index.insert(key, offset);
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Point lookup: O(log n) via the in-memory index, one seek for the value
    pub fn get(&mut self, key: &[u8]) -> Result<Lookup> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(Lookup::Absent),
        };

        self.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = le_u32(&header, 0)?;
        let val_len = le_u32(&header, 4)?;

        self.file.seek(SeekFrom::Current(key_len as i64))?;
        if val_len == TOMBSTONE_MARKER {
            return Ok(Lookup::Tombstone);
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok(Lookup::Found(value))
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Quick range check against the smallest and largest indexed key
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.index.keys().next(), self.index.keys().next_back()) {
            (Some(min), Some(max)) => key >= min.as_slice() && key <= max.as_slice(),
            _ => false,
        }
    }

    /// Iterate all entries in key order (compaction)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}
