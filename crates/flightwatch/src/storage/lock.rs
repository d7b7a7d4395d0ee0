//! Exclusive lock shared by every process using one store.
//!
//! A running `flightwatch run` and a one-off `flightwatch check` can open the
//! same store. Each reconciliation holds an advisory lock on a sibling
//! `.lock` file for the whole pass, so passes from different processes never
//! interleave their reads and writes of the flight state.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::error::{Error, Result};

/// An exclusive lock on a store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Wait until the lock at `path` is free and take it.
    ///
    /// The lock file is created if it does not exist. Waiting happens on the
    /// blocking pool, so the runtime keeps serving other tasks meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked.
    pub async fn acquire(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(|e| Error::internal(format!("store lock task failed: {e}")))?
    }

    fn acquire_blocking(path: PathBuf) -> Result<Self> {
        let lock_error = |source: std::io::Error| Error::StoreLock {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_error)?;
        file.lock().map_err(lock_error)?;

        trace!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        match self.file.unlock() {
            Ok(()) => trace!("Unlocked {}", self.path.display()),
            Err(e) => warn!("Could not unlock {}: {}", self.path.display(), e),
        }
    }
}

/// Lock file that guards the store at `path`.
#[must_use]
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
