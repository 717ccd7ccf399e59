//! Binlog Writer
//!
//! Appends framed records and tracks the end offset.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{OptiError, Result};

use super::BinlogRecord;

/// Appends records to the binlog file
pub struct BinlogWriter {
    path: PathBuf,
    file: File,
    position: u64,
    sync_strategy: SyncStrategy,
    unsynced: usize,
}

impl BinlogWriter {
    /// Open or create the log, positioned at its end
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let position = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            position,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append one record; returns the offset just past it
    ///
    /// A failed write is rolled back by truncating to the previous end, so a
    /// later append never lands behind a torn record.
    pub fn append(&mut self, record: &BinlogRecord) -> Result<u64> {
        let bytes = record.encode()?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback();
            return Err(OptiError::BinlogWrite(e.to_string()));
        }

        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            if let Err(e) = self.sync() {
                self.rollback();
                return Err(e);
            }
        }

        self.position += bytes.len() as u64;
        Ok(self.position)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Current end offset
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.position)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.position)).map(|_| ()));
        if let Err(e) = restored {
            tracing::error!(
                "Failed to roll back torn binlog append at {}: {}",
                self.position,
                e
            );
        }
    }
}
