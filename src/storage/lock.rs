//! Advisory single-writer lock for a store file.
//!
//! SQLite serialises individual writes, but two `isync` processes syncing
//! the same store would interleave their per-issue upserts. Writers take an
//! exclusive `flock` on `<store>.lock` for the duration of a batch.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How long [`StoreLock::acquire`] waits before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive lock guard; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Lock file path for a store.
    #[must_use]
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Acquire the lock, waiting up to [`DEFAULT_LOCK_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` on timeout, or an I/O error if the lock file
    /// cannot be created.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        Self::acquire_with_timeout(store_path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Acquire the lock, polling until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` on timeout, or an I/O error if the lock file
    /// cannot be created.
    pub fn acquire_with_timeout(store_path: &Path, timeout: Duration) -> Result<Self> {
        let path = Self::lock_path(store_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "Acquired store lock");
                    return Ok(Self { file });
                }
                Err(e) if started.elapsed() < timeout => {
                    debug!(error = %e, "Store lock busy, retrying");
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => {
                    warn!(path = %path.display(), "Timed out waiting for store lock");
                    return Err(Error::StoreLocked {
                        path: store_path.to_path_buf(),
                    });
                }
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
