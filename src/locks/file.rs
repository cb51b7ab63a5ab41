//! Lock-file creation, verification and the acquisition state machine.

use super::guard::LockHandle;
use crate::error::{Result, SegdirError};
use crate::process;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Upper bound on lock-file content during verification. Content that is
/// empty or fills this buffer exactly is malformed and treated as not
/// locked.
const LOCK_CONTENT_MAX: usize = 256;

/// Delay between acquisition attempts in `try_lock`.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// A single-shot advisory lock over a file path.
///
/// States: Unlocked -> Locked -> Unlocked. `lock` on an instance that
/// already holds the lock returns `Ok(false)` without side effects;
/// `unlock` on an instance that does not hold it likewise.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    handle: Option<LockHandle>,
}

impl LockFile {
    /// Create an unlocked handle for the lock file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
        }
    }

    /// Path of the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attempt to acquire the lock.
    ///
    /// Returns `Ok(false)` when the lock is held elsewhere or this
    /// instance already holds it (acquisition is not recursive). A lock
    /// file left behind by a dead or foreign-format owner is reclaimed
    /// transparently.
    pub fn lock(&mut self) -> Result<bool> {
        if self.handle.is_some() {
            return Ok(false);
        }

        // Two rounds: exclusive create, and one reclaim-then-retry if the
        // existing file turns out to be stale. Losing the second create
        // race means someone else acquired it first.
        for _ in 0..2 {
            if let Some(handle) = create_lock_file(&self.path)? {
                self.handle = Some(handle);
                return Ok(true);
            }

            if verify_lock_file(&self.path)? {
                return Ok(false);
            }

            tracing::info!(
                path = %self.path.display(),
                "reclaiming stale lock file",
            );
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(SegdirError::io(&self.path, e)),
            }
        }

        Ok(false)
    }

    /// Retry `lock` until it succeeds or `timeout` elapses.
    pub fn try_lock(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lock()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(RETRY_INTERVAL.min(deadline - now));
        }
    }

    /// Release a held lock. `Ok(false)` when this instance holds nothing
    /// (double release is a no-op, not an error).
    pub fn unlock(&mut self) -> Result<bool> {
        match self.handle.take() {
            Some(handle) => handle.release().map(|()| true),
            None => Ok(false),
        }
    }

    /// Whether this instance currently holds the lock. Local state only;
    /// the file on disk is not re-verified.
    pub fn is_locked(&self) -> bool {
        self.handle.is_some()
    }
}

/// Exclusive-create the lock file and write the owner identity.
///
/// `Ok(None)` means the file already exists (somebody may hold the lock).
/// On success the content is `hostname NUL pid`, fsync'd, and on POSIX an
/// exclusive flock is held on the returned descriptor. Any mid-write
/// failure removes the partial file before returning the error.
fn create_lock_file(path: &Path) -> Result<Option<LockHandle>> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to create lock file");
            return Err(SegdirError::io(path, e));
        }
    };

    let host = process::host_name()?;
    let identity = write_identity(&mut file, &host);
    if let Err(e) = identity {
        let _ = fs::remove_file(path);
        tracing::error!(path = %path.display(), error = %e, "failed to write lock identity");
        return Err(SegdirError::io(path, e));
    }

    match try_flock_exclusive(&file) {
        Ok(true) => Ok(Some(LockHandle::new(file, path.to_path_buf()))),
        Ok(false) => {
            // Somebody flocked the file we just created out from under us.
            // Leave it to the owner; report contention.
            Ok(None)
        }
        Err(e) => {
            let _ = fs::remove_file(path);
            tracing::error!(path = %path.display(), error = %e, "failed to flock lock file");
            Err(SegdirError::io(path, e))
        }
    }
}

fn write_identity(file: &mut File, host: &str) -> std::io::Result<()> {
    file.write_all(host.as_bytes())?;
    file.write_all(&[0])?;
    file.write_all(process::pid().to_string().as_bytes())?;
    file.sync_all()
}

/// Is the lock file at `path` currently held by a live owner?
///
/// Missing file: not locked. An unobtainable advisory flock: locked,
/// without further inspection. Otherwise the content decides, per the
/// conservative policy: foreign hostnames are locked, and anything
/// malformed (empty, overlong, no NUL, missing or dead pid) is not.
pub fn verify_lock_file(path: &Path) -> Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(SegdirError::io(path, e)),
    };

    // The flock here is released when `file` drops at the end of
    // verification; it exists only to detect a live holder.
    match try_flock_exclusive(&file) {
        Ok(true) => {}
        Ok(false) => return Ok(true),
        Err(e) => return Err(SegdirError::io(path, e)),
    }

    let mut buf = [0u8; LOCK_CONTENT_MAX];
    let mut len = 0;
    while len < buf.len() {
        match file.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(SegdirError::io(path, e)),
        }
    }
    if len == 0 || len == LOCK_CONTENT_MAX {
        tracing::debug!(path = %path.display(), len, "malformed lock file content");
        return Ok(false);
    }
    let content = &buf[..len];

    let Some(nul) = content.iter().position(|&b| b == 0) else {
        // Writer died before terminating the hostname.
        tracing::debug!(path = %path.display(), "lock file has no pid segment");
        return Ok(false);
    };

    if !process::is_same_hostname(&content[..nul])? {
        tracing::info!(
            path = %path.display(),
            host = %String::from_utf8_lossy(&content[..nul]),
            "lock file is held by another host",
        );
        return Ok(true);
    }

    let pid_text = &content[nul + 1..];
    if pid_text.is_empty() {
        return Ok(false);
    }
    let pid_text = std::str::from_utf8(pid_text).unwrap_or("");
    if process::is_valid_pid(pid_text) {
        tracing::info!(
            path = %path.display(),
            pid = pid_text,
            "lock file is held by a live process",
        );
        Ok(true)
    } else {
        tracing::debug!(
            path = %path.display(),
            pid = pid_text,
            "lock file owner is not running; orphaned",
        );
        Ok(false)
    }
}

/// Non-blocking exclusive advisory lock on an open descriptor.
///
/// `Ok(false)` means another descriptor holds it.
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

/// On Windows the exclusive sharing mode of the create denies concurrent
/// opens; no separate advisory lock is taken.
#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}
