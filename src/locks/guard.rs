//! RAII handle for an acquired lock.

use crate::error::{Result, SegdirError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Ownership of an acquired advisory lock.
///
/// The handle owns the open descriptor; on POSIX the exclusive `flock`
/// taken at creation lives exactly as long as that descriptor. Dropping
/// the handle closes the descriptor and removes the lock file. If removal
/// fails during drop, a warning is logged but no panic occurs.
///
/// Not clonable, not shareable: exactly one handle exists per successful
/// acquisition.
#[derive(Debug)]
pub struct LockHandle {
    /// Open descriptor backing the advisory lock. `None` once released.
    file: Option<File>,

    /// Path of the lock file on disk.
    path: PathBuf,

    /// Whether the lock has been released manually.
    released: bool,
}

impl LockHandle {
    pub(super) fn new(file: File, path: PathBuf) -> Self {
        Self {
            file: Some(file),
            path,
            released: false,
        }
    }

    /// Path of the lock file this handle owns.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Manually release the lock, surfacing any removal error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.release_inner()
            .map_err(|e| SegdirError::io(&self.path, e))
    }

    fn release_inner(&mut self) -> std::io::Result<()> {
        // Closing the descriptor drops the advisory flock; only then is it
        // safe for the next acquirer to see the file disappear.
        drop(self.file.take());
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.release_inner()
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release lock file",
            );
        }
    }
}
