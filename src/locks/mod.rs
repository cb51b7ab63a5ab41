//! Advisory lock-file protocol.
//!
//! A lock is a file created with exclusive-create semantics whose content
//! records the owner: `<hostname bytes> NUL <pid decimal ASCII>`. The
//! exclusive create is the mutual-exclusion primitive; on POSIX an
//! exclusive `flock` on the descriptor backs it up for the lifetime of
//! the holder.
//!
//! # Staleness and orphans
//!
//! A crashed holder leaves the file behind. The next acquirer inspects
//! it: content from a different host is conservatively treated as held;
//! content from this host is probed against the process table and
//! reclaimed when the recorded pid is dead, missing or unparseable.
//! Any ambiguity about identity defaults to "not locked", except an
//! unobtainable advisory flock, which is itself proof of a live holder.
//!
//! # RAII
//!
//! Acquisition hands back a [`LockHandle`] that releases the OS lock and
//! removes the file when dropped. Failures on the drop path log a
//! warning rather than panic.

mod file;
mod guard;

#[cfg(test)]
mod tests;

pub use file::{LockFile, verify_lock_file};
pub use guard::LockHandle;
