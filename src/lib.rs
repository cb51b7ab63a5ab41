//! Directory abstraction for segment-based storage engines.
//!
//! The crate provides three layers:
//!
//! - [`Crc32`]: an incremental CRC32C (Castagnoli) accumulator used to
//!   integrity-check every byte written through a directory.
//! - [`DataOutput`] / [`DataInput`]: the symmetric read/write contract for
//!   fixed-width integers, base-128 varints and length-prefixed strings
//!   that index file formats are built on.
//! - [`Directory`]: a set of named byte streams with `create`/`open`/
//!   `rename`/`visit` semantics plus advisory locking. Two backends are
//!   provided: [`FsDirectory`] (lock files with hostname+pid ownership and
//!   orphan detection) and [`MemoryDirectory`] (for tests and transient
//!   indexes).
//!
//! # Locking model
//!
//! Locks are advisory and host+pid local. A lock file records the owner as
//! `<hostname> NUL <pid>`; a later acquirer on the same host probes the
//! recorded pid and silently reclaims the file if the owner is dead. A
//! lock recorded by a different host is conservatively treated as held;
//! this is not a distributed lock service.

pub mod checksum;
pub mod directory;
pub mod error;
pub mod fsops;
pub mod io;
pub mod locks;
pub mod process;

pub use checksum::Crc32;
pub use directory::{Directory, FsDirectory, IoAdvice, Lock, MemoryDirectory};
pub use error::{Result, SegdirError};
pub use io::{DataInput, DataOutput};
pub use locks::{LockFile, LockHandle};
