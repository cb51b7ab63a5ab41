//! The directory facade.
//!
//! A [`Directory`] is a flat set of named byte streams plus advisory
//! locking: the storage-engine abstraction every index file format is
//! written against. Two backends are provided, [`FsDirectory`] over a
//! filesystem root and [`MemoryDirectory`] for transient indexes and
//! tests. Both expose the same codec, checksum and locking contracts.

mod fs;
mod memory;


pub use fs::FsDirectory;
pub use memory::MemoryDirectory;

use crate::error::Result;
use crate::io::{DataInput, DataOutput};
use crate::locks::LockFile;
use std::time::Duration;

/// Read-pattern hint passed to [`Directory::open`].
///
/// Advice never affects correctness, only how the backend may prime the
/// OS cache for the expected access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoAdvice {
    #[default]
    Normal,
    Sequential,
    Random,
}

/// An acquirable lock handed out by [`Directory::make_lock`].
///
/// Instances are single-shot: acquire once, release once. Re-locking a
/// held instance and double-releasing both report `Ok(false)` without
/// side effects.
pub trait Lock: Send {
    /// Attempt to acquire; `Ok(false)` on contention.
    fn lock(&mut self) -> Result<bool>;

    /// Retry acquisition until `timeout` elapses.
    fn try_lock(&mut self, timeout: Duration) -> Result<bool>;

    /// Release; `Ok(false)` when nothing was held.
    fn unlock(&mut self) -> Result<bool>;

    /// Whether this instance holds the lock (local state query).
    fn is_locked(&self) -> bool;
}

impl Lock for LockFile {
    fn lock(&mut self) -> Result<bool> {
        LockFile::lock(self)
    }

    fn try_lock(&mut self, timeout: Duration) -> Result<bool> {
        LockFile::try_lock(self, timeout)
    }

    fn unlock(&mut self) -> Result<bool> {
        LockFile::unlock(self)
    }

    fn is_locked(&self) -> bool {
        LockFile::is_locked(self)
    }
}

/// A named collection of byte streams with advisory locking.
pub trait Directory: Send + Sync {
    /// Create (or truncate) the named file and return a writer for it.
    fn create(&self, name: &str) -> Result<Box<dyn DataOutput>>;

    /// Open the named file for reading.
    fn open(&self, name: &str, advice: IoAdvice) -> Result<Box<dyn DataInput>>;

    /// Whether the named file exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Size of the named file in bytes.
    fn length(&self, name: &str) -> Result<u64>;

    /// Remove the named file; false when it did not exist.
    fn remove(&self, name: &str) -> bool;

    /// Rename `from` to `to`, replacing any existing `to`.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Durably flush the named file.
    fn sync(&self, name: &str) -> Result<()>;

    /// Enumerate file names; stops early when the visitor returns false.
    ///
    /// `Ok(true)` when every name was visited.
    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> Result<bool>;

    /// Build an unacquired lock for the given logical name.
    fn make_lock(&self, name: &str) -> Box<dyn Lock>;
}
