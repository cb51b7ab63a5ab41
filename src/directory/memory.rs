//! In-memory directory.
//!
//! Files are immutable `Arc<[u8]>`-style buffers behind a shared map, so
//! readers are plain cursor-over-slice values and duplication is an Arc
//! clone. Locks are names in a shared set; the protocol semantics
//! (single-shot, non-recursive, double-release reports false) mirror the
//! filesystem lock exactly, without any process-liveness dimension.

use super::{Directory, IoAdvice, Lock};
use crate::checksum::Crc32;
use crate::error::{Result, SegdirError};
use crate::io::{DataInput, DataOutput};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

type Files = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;
type LockNames = Arc<Mutex<HashSet<String>>>;

/// A directory whose files live on the heap.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    files: Files,
    locks: LockNames,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for MemoryDirectory {
    fn create(&self, name: &str) -> Result<Box<dyn DataOutput>> {
        // Register the (empty) file immediately so exists/visit see it
        // before the first flush.
        self.files
            .write()
            .expect("file map poisoned")
            .insert(name.to_string(), Arc::new(Vec::new()));

        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            files: Arc::clone(&self.files),
            buf: Vec::new(),
            crc: Crc32::new(),
        }))
    }

    fn open(&self, name: &str, _advice: IoAdvice) -> Result<Box<dyn DataInput>> {
        let files = self.files.read().expect("file map poisoned");
        let data = files
            .get(name)
            .cloned()
            .ok_or_else(|| SegdirError::FileNotFound(name.to_string()))?;
        Ok(Box::new(MemoryInput { data, pos: 0 }))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .files
            .read()
            .expect("file map poisoned")
            .contains_key(name))
    }

    fn length(&self, name: &str) -> Result<u64> {
        let files = self.files.read().expect("file map poisoned");
        files
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| SegdirError::FileNotFound(name.to_string()))
    }

    fn remove(&self, name: &str) -> bool {
        self.files
            .write()
            .expect("file map poisoned")
            .remove(name)
            .is_some()
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write().expect("file map poisoned");
        let data = files
            .remove(from)
            .ok_or_else(|| SegdirError::FileNotFound(from.to_string()))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn sync(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> Result<bool> {
        // Snapshot the names so the visitor may mutate the directory.
        let names: Vec<String> = self
            .files
            .read()
            .expect("file map poisoned")
            .keys()
            .cloned()
            .collect();

        for name in names {
            if !visitor(&name) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        Box::new(MemoryLock {
            name: name.to_string(),
            locks: Arc::clone(&self.locks),
            held: false,
        })
    }
}

/// Writer accumulating into a heap buffer; committed to the shared map on
/// flush and on drop.
struct MemoryOutput {
    name: String,
    files: Files,
    buf: Vec<u8>,
    crc: Crc32,
}

impl MemoryOutput {
    fn commit(&self) {
        self.files
            .write()
            .expect("file map poisoned")
            .insert(self.name.clone(), Arc::new(self.buf.clone()));
    }
}

impl DataOutput for MemoryOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(buf);
        self.crc.process_bytes(buf);
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.buf.len() as u64
    }

    fn checksum(&self) -> u32 {
        self.crc.checksum()
    }

    fn flush(&mut self) -> Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.commit();
    }
}

/// Cursor over an immutable shared buffer.
struct MemoryInput {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl DataInput for MemoryInput {
    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(SegdirError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.data.len() - self.pos;
        let n = buf.len().min(remaining);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn dup(&self) -> Result<Box<dyn DataInput>> {
        Ok(Box::new(MemoryInput {
            data: Arc::clone(&self.data),
            pos: self.pos,
        }))
    }

    fn reopen(&self) -> Result<Box<dyn DataInput>> {
        Ok(Box::new(MemoryInput {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }
}

/// In-process lock over a shared name set.
struct MemoryLock {
    name: String,
    locks: LockNames,
    held: bool,
}

impl Lock for MemoryLock {
    fn lock(&mut self) -> Result<bool> {
        if self.held {
            return Ok(false);
        }
        let mut locks = self.locks.lock().expect("lock set poisoned");
        self.held = locks.insert(self.name.clone());
        Ok(self.held)
    }

    fn try_lock(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lock()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(10).min(deadline - now));
        }
    }

    fn unlock(&mut self) -> Result<bool> {
        if !self.held {
            return Ok(false);
        }
        self.held = false;
        Ok(self
            .locks
            .lock()
            .expect("lock set poisoned")
            .remove(&self.name))
    }

    fn is_locked(&self) -> bool {
        self.held
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        if self.held {
            self.locks
                .lock()
                .expect("lock set poisoned")
                .remove(&self.name);
        }
    }
}
