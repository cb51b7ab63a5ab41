//! Cross-platform file primitives.
//!
//! Everything the lock protocol and the filesystem directory backend need
//! from the OS lives here: stat queries, durability syncs, directory
//! enumeration, positioned reads, and canonical-path recovery from an open
//! descriptor (the mechanism behind `dup`/`reopen` on inputs whose
//! original path may already be renamed or deleted).

use crate::error::{Result, SegdirError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Fallback when the platform does not report a preferred I/O block size.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// Best-effort snapshot of a file's metadata.
///
/// Never cached; every call re-stats the path.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub block_size: u64,
    pub is_directory: bool,
}

/// Whether `path` names an existing filesystem entry.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Whether `path` names a directory.
pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

/// Size of the file at `path` in bytes.
pub fn file_size(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|e| SegdirError::io(path, e))?;
    Ok(meta.len())
}

/// Stat `path`, filling in platform defaults where a field is unavailable.
pub fn stat(path: &Path) -> Result<FileStat> {
    let meta = fs::metadata(path).map_err(|e| SegdirError::io(path, e))?;
    Ok(FileStat {
        size: meta.len(),
        mtime: meta.modified().ok(),
        block_size: block_size_of(&meta),
        is_directory: meta.is_dir(),
    })
}

#[cfg(unix)]
fn block_size_of(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    match meta.blksize() {
        0 => DEFAULT_BLOCK_SIZE,
        n => n,
    }
}

#[cfg(not(unix))]
fn block_size_of(_meta: &fs::Metadata) -> u64 {
    DEFAULT_BLOCK_SIZE
}

/// Flush the file at `path` durably to disk.
#[cfg(unix)]
pub fn file_sync(path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| SegdirError::io(path, e))?;
    file.sync_all().map_err(|e| SegdirError::io(path, e))
}

/// Flush the file at `path` durably to disk.
///
/// Opening an already-open file can spuriously fail under restrictive
/// sharing flags, so progressively more permissive share modes are tried:
/// WRITE, then READ, then DELETE, then none.
#[cfg(windows)]
pub fn file_sync(path: &Path) -> Result<()> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x1;
    const FILE_SHARE_WRITE: u32 = 0x2;
    const FILE_SHARE_DELETE: u32 = 0x4;

    let mut last_err = None;
    for share in [FILE_SHARE_WRITE, FILE_SHARE_READ, FILE_SHARE_DELETE, 0] {
        match fs::OpenOptions::new()
            .write(true)
            .share_mode(share)
            .open(path)
        {
            Ok(file) => return file.sync_all().map_err(|e| SegdirError::io(path, e)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(SegdirError::io(
        path,
        last_err.unwrap_or_else(|| std::io::Error::other("no sharing mode accepted")),
    ))
}

/// Re-derive the canonical path of an already-open file from the OS.
///
/// Works through the descriptor, so it stays correct after the original
/// path is renamed or unlinked.
#[cfg(target_os = "linux")]
pub fn canonical_path(file: &File) -> std::io::Result<PathBuf> {
    use std::os::unix::io::AsRawFd;
    fs::read_link(format!("/proc/self/fd/{}", file.as_raw_fd()))
}

#[cfg(target_os = "macos")]
pub fn canonical_path(file: &File) -> std::io::Result<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::AsRawFd;

    let mut buf = [0u8; libc::PATH_MAX as usize];
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETPATH, buf.as_mut_ptr()) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(&buf[..len])))
}

#[cfg(windows)]
pub fn canonical_path(file: &File) -> std::io::Result<PathBuf> {
    use std::os::windows::ffi::OsStringExt;
    use std::os::windows::io::AsRawHandle;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn GetFinalPathNameByHandleW(
            hFile: *mut std::ffi::c_void,
            lpszFilePath: *mut u16,
            cchFilePath: u32,
            dwFlags: u32,
        ) -> u32;
    }

    let mut buf = vec![0u16; 4096];
    let len = unsafe {
        GetFinalPathNameByHandleW(file.as_raw_handle(), buf.as_mut_ptr(), buf.len() as u32, 0)
    };
    if len == 0 || len as usize > buf.len() {
        return Err(std::io::Error::last_os_error());
    }
    // Strip the \\?\ extended-length prefix when present.
    let path = std::ffi::OsString::from_wide(&buf[..len as usize]);
    let path = PathBuf::from(path);
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) => Ok(PathBuf::from(stripped)),
        None => Ok(path),
    }
}

/// Positioned read with no shared seek state.
#[cfg(unix)]
pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

/// Positioned read with no shared seek state.
#[cfg(windows)]
pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Enumerate the entries of `path`, handing each name to `visitor`.
///
/// Stops early when the visitor returns false. The result is `Ok(true)`
/// when every entry was visited, `Ok(false)` on early stop, and `Err`
/// when the directory itself could not be opened. `.` and `..` are never
/// yielded.
pub fn visit_directory<F>(path: &Path, mut visitor: F) -> Result<bool>
where
    F: FnMut(&str) -> bool,
{
    let entries = fs::read_dir(path).map_err(|e| SegdirError::io(path, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| SegdirError::io(path, e))?;
        let name = entry.file_name();
        if !visitor(&name.to_string_lossy()) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn stat_reports_size_and_kind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data");
        fs::write(&path, b"0123456789").unwrap();

        assert!(exists(&path));
        assert!(!is_directory(&path));
        assert!(is_directory(tmp.path()));
        assert_eq!(file_size(&path).unwrap(), 10);

        let st = stat(&path).unwrap();
        assert_eq!(st.size, 10);
        assert!(!st.is_directory);
        assert!(st.block_size > 0);
        assert!(st.mtime.is_some());
    }

    #[test]
    fn file_size_of_missing_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(file_size(&tmp.path().join("missing")).is_err());
        assert!(!exists(&tmp.path().join("missing")));
    }

    #[test]
    fn sync_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data");
        fs::write(&path, b"x").unwrap();
        file_sync(&path).unwrap();
    }

    #[test]
    fn canonical_path_survives_rename() {
        let tmp = TempDir::new().unwrap();
        let before = tmp.path().join("before");
        let after = tmp.path().join("after");

        let mut f = File::create(&before).unwrap();
        f.write_all(b"payload").unwrap();
        let readable = File::open(&before).unwrap();

        fs::rename(&before, &after).unwrap();

        let canonical = canonical_path(&readable).unwrap();
        assert_eq!(canonical.file_name().unwrap(), "after");
    }

    #[test]
    fn read_at_does_not_move_other_cursors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data");
        fs::write(&path, b"abcdefgh").unwrap();

        let f = File::open(&path).unwrap();
        let mut one = [0u8; 4];
        let mut two = [0u8; 4];
        assert_eq!(read_at(&f, &mut two, 4).unwrap(), 4);
        assert_eq!(read_at(&f, &mut one, 0).unwrap(), 4);
        assert_eq!(&one, b"abcd");
        assert_eq!(&two, b"efgh");
    }

    #[test]
    fn visit_enumerates_and_stops_early() {
        let tmp = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }

        let mut seen = Vec::new();
        assert!(
            visit_directory(tmp.path(), |name| {
                seen.push(name.to_string());
                true
            })
            .unwrap()
        );
        seen.sort();
        assert_eq!(seen, ["a", "b", "c"]);

        let mut count = 0;
        let finished = visit_directory(tmp.path(), |_| {
            count += 1;
            false
        })
        .unwrap();
        assert!(!finished);
        assert_eq!(count, 1);
    }

    #[test]
    fn visit_missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(visit_directory(&tmp.path().join("nope"), |_| true).is_err());
    }
}
