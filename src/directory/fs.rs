//! Filesystem-backed directory.

use super::{Directory, IoAdvice, Lock};
use crate::checksum::Crc32;
use crate::error::{Result, SegdirError};
use crate::fsops;
use crate::io::{DataInput, DataOutput};
use crate::locks::LockFile;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A directory of files under a filesystem root.
///
/// Locks made by this directory use the cross-process lock-file protocol;
/// inputs support `dup`/`reopen` through descriptor-backed canonical
/// paths, so readers stay valid across renames and removals of the
/// original name.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Wrap the directory at `root`. The root itself is created lazily on
    /// the first `create`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path this directory is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn create(&self, name: &str) -> Result<Box<dyn DataOutput>> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|e| SegdirError::io(&self.root, e))?;
        }

        let path = self.resolve(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "failed to create file");
                SegdirError::io(&path, e)
            })?;

        Ok(Box::new(FsOutput {
            writer: BufWriter::new(file),
            path,
            pointer: 0,
            crc: Crc32::new(),
        }))
    }

    fn open(&self, name: &str, _advice: IoAdvice) -> Result<Box<dyn DataInput>> {
        let path = self.resolve(name);
        let file = File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SegdirError::FileNotFound(name.to_string()),
            _ => SegdirError::io(&path, e),
        })?;
        let len = file
            .metadata()
            .map_err(|e| SegdirError::io(&path, e))?
            .len();

        Ok(Box::new(FsInput {
            file,
            path,
            pos: 0,
            len,
        }))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(fsops::exists(&self.resolve(name)))
    }

    fn length(&self, name: &str) -> Result<u64> {
        fsops::file_size(&self.resolve(name))
    }

    fn remove(&self, name: &str) -> bool {
        let path = self.resolve(name);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::error!(path = %path.display(), error = %e, "failed to remove file");
                }
                false
            }
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.resolve(from);
        let to_path = self.resolve(to);
        fs::rename(&from_path, &to_path).map_err(|e| SegdirError::io(&from_path, e))
    }

    fn sync(&self, name: &str) -> Result<()> {
        fsops::file_sync(&self.resolve(name))
    }

    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> Result<bool> {
        fsops::visit_directory(&self.root, |name| visitor(name))
    }

    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        Box::new(LockFile::new(self.resolve(name)))
    }
}

/// Buffered writer over a directory file, folding every byte into a
/// running CRC32C.
struct FsOutput {
    writer: BufWriter<File>,
    path: PathBuf,
    pointer: u64,
    crc: Crc32,
}

impl DataOutput for FsOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.writer
            .write_all(buf)
            .map_err(|e| SegdirError::io(&self.path, e))?;
        self.crc.process_bytes(buf);
        self.pointer += buf.len() as u64;
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.pointer
    }

    fn checksum(&self) -> u32 {
        self.crc.checksum()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| SegdirError::io(&self.path, e))
    }
}

/// Reader over a directory file with an independent cursor.
///
/// Reads are positioned (`read_at`), so any number of duplicated inputs
/// can advance concurrently with no shared seek state.
struct FsInput {
    file: File,
    path: PathBuf,
    pos: u64,
    len: u64,
}

impl DataInput for FsInput {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        if self.read_bytes(&mut buf)? == 0 {
            return Err(SegdirError::UnexpectedEof);
        }
        Ok(buf[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;

        let mut filled = 0;
        while filled < want {
            match fsops::read_at(&self.file, &mut buf[filled..want], self.pos + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(SegdirError::io(&self.path, e)),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    fn file_pointer(&self) -> u64 {
        self.pos
    }

    fn length(&self) -> u64 {
        self.len
    }

    fn dup(&self) -> Result<Box<dyn DataInput>> {
        let file = self
            .file
            .try_clone()
            .map_err(|e| SegdirError::io(&self.path, e))?;
        Ok(Box::new(FsInput {
            file,
            path: self.path.clone(),
            pos: self.pos,
            len: self.len,
        }))
    }

    fn reopen(&self) -> Result<Box<dyn DataInput>> {
        // Resolve through the open descriptor, not the original name:
        // the file may have been renamed or unlinked since.
        let canonical =
            fsops::canonical_path(&self.file).map_err(|e| SegdirError::io(&self.path, e))?;
        let file = File::open(&canonical).map_err(|e| SegdirError::io(&canonical, e))?;
        let len = file
            .metadata()
            .map_err(|e| SegdirError::io(&canonical, e))?
            .len();

        Ok(Box::new(FsInput {
            file,
            path: canonical,
            pos: 0,
            len,
        }))
    }
}
