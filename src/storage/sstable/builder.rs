//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{OptiError, Result};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
///
/// Output goes to `<path>.tmp` and is renamed into place by `finish()`, so a
/// crash mid-build never leaves a half-written table under the final name.
pub struct SSTableBuilder {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    current_offset: u64,
    index: Vec<(Vec<u8>, u64)>,
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Call `add()`/`add_tombstone()` in strictly ascending key order.
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // entry count, patched in finish

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(OptiError::Storage(
                    "SSTable keys must be added in ascending order".to_string(),
                ));
            }
        }

        self.index.push((key.to_vec(), self.current_offset));

        let val_len = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };
        let key_len_bytes = (key.len() as u32).to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;
        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        let mut entry_size = 8 + key.len() as u64;
        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
            entry_size += v.len() as u64;
        }

        self.current_offset += entry_size;
        self.entry_count += 1;
        Ok(())
    }

    /// Write index block and footer, fsync, and move the file into place
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| OptiError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // after magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        std::fs::rename(&self.tmp_path, &self.path)?;

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            file_size,
        })
    }
}
