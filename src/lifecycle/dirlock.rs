//! Persistence directory lock
//!
//! A `LOCK` file created with `create_new`; its presence means another
//! instance owns the directory (or one crashed without releasing it).

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{OptiError, Result};

/// Exclusive claim on a persistence directory
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub const FILE_NAME: &'static str = "LOCK";

    /// Create `dir` if needed and claim it
    ///
    /// Fails with `DirectoryLocked` without touching anything if the lock
    /// file already exists.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(OptiError::DirectoryLocked(dir.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        tracing::debug!("Acquired directory lock {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file (clean shutdown only)
    pub fn release(self) -> Result<()> {
        fs::remove_file(&self.path)?;
        tracing::debug!("Released directory lock {}", self.path.display());
        Ok(())
    }
}
