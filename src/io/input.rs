//! The read half of the codec contract.

use crate::checksum::Crc32;
use crate::error::{Result, SegdirError};
use crate::io::{MAX_VINT_BYTES, MAX_VLONG_BYTES};

/// Abstract input stream for directory files.
///
/// Each input owns its cursor; duplicating or reopening an input yields an
/// independent cursor over the same immutable backing bytes, safe to
/// advance from another thread. A reopened input stays valid even if the
/// original file name was renamed or removed, because backends resolve it
/// through the already-open descriptor rather than the path.
///
/// End-of-stream is a clean condition for `read_bytes` (a short or
/// zero-length read), never an error. The fixed-width readers return
/// [`SegdirError::UnexpectedEof`] when the stream cannot supply a whole
/// value.
pub trait DataInput: Send {
    /// Read one byte, failing with `UnexpectedEof` at end of stream.
    fn read_byte(&mut self) -> Result<u8>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Short reads happen only at end of stream; while data remains the
    /// full request is satisfied. At end of stream the result is 0.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Current cursor position. Always `<= length()`.
    fn file_pointer(&self) -> u64;

    /// Total size of the stream in bytes.
    fn length(&self) -> u64;

    /// Duplicate this input: an independent cursor at the same position.
    fn dup(&self) -> Result<Box<dyn DataInput>>;

    /// Reopen this input from the start via its backing descriptor.
    fn reopen(&self) -> Result<Box<dyn DataInput>>;

    /// True exactly when the cursor has consumed the whole stream.
    fn eof(&self) -> bool {
        self.file_pointer() >= self.length()
    }

    /// Fill `buf` completely or fail with `UnexpectedEof`.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.read_bytes(buf)? != buf.len() {
            return Err(SegdirError::UnexpectedEof);
        }
        Ok(())
    }

    /// Read a 16-bit value, big-endian.
    fn read_short(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_fully(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Read a 32-bit value, big-endian.
    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_fully(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read a 64-bit value, big-endian.
    fn read_long(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_fully(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Read a base-128 varint written by `write_vint`.
    fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u64;
        for i in 0..MAX_VINT_BYTES {
            let b = self.read_byte()?;
            value |= u64::from(b & 0x7F) << (7 * i);
            if b & 0x80 == 0 {
                return u32::try_from(value).map_err(|_| SegdirError::MalformedVarint);
            }
        }
        Err(SegdirError::MalformedVarint)
    }

    /// Read a base-128 varint written by `write_vlong`.
    fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u128;
        for i in 0..MAX_VLONG_BYTES {
            let b = self.read_byte()?;
            value |= u128::from(b & 0x7F) << (7 * i);
            if b & 0x80 == 0 {
                return u64::try_from(value).map_err(|_| SegdirError::MalformedVarint);
            }
        }
        Err(SegdirError::MalformedVarint)
    }

    /// Read a length-prefixed UTF-8 string written by `write_string`.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_fully(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// CRC32C of the next `len` bytes, without advancing this cursor.
    ///
    /// Reads through a duplicate; `len` is clamped to the bytes remaining.
    fn checksum(&self, len: u64) -> Result<u32> {
        let mut cursor = self.dup()?;
        let mut crc = Crc32::new();
        let mut remaining = len.min(self.length().saturating_sub(self.file_pointer()));
        let mut buf = [0u8; 4096];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let got = cursor.read_bytes(&mut buf[..want])?;
            if got == 0 {
                break;
            }
            crc.process_bytes(&buf[..got]);
            remaining -= got as u64;
        }
        Ok(crc.checksum())
    }
}
