//! The write half of the codec contract.

use crate::error::Result;

/// Abstract output stream for directory files.
///
/// Implementations provide raw byte output plus position, flush and a
/// running CRC32C of everything written; the numeric and string encodings
/// are provided methods on top of those.
///
/// Fixed-width values are written big-endian. The contract is value-based:
/// writing `u32::MAX as i32` and reading it back through the signed
/// accessor yields the identical bit pattern, so callers are free to
/// reinterpret between signed and unsigned.
pub trait DataOutput: Send {
    /// Append a single byte.
    fn write_byte(&mut self, b: u8) -> Result<()>;

    /// Append a run of raw bytes.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    /// Number of bytes written so far.
    fn file_pointer(&self) -> u64;

    /// Running CRC32C of every byte written so far.
    fn checksum(&self) -> u32;

    /// Push buffered bytes down to the backing store.
    fn flush(&mut self) -> Result<()>;

    /// Write a 16-bit value, big-endian.
    fn write_short(&mut self, v: i16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Write a 32-bit value, big-endian.
    fn write_int(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Write a 64-bit value, big-endian.
    fn write_long(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Write an unsigned 32-bit value as a base-128 varint.
    ///
    /// Small values take fewer bytes; the encoding is self-delimiting, so
    /// consecutive varints need no separator.
    fn write_vint(&mut self, v: u32) -> Result<()> {
        self.write_vlong(u64::from(v))
    }

    /// Write an unsigned 64-bit value as a base-128 varint.
    fn write_vlong(&mut self, mut v: u64) -> Result<()> {
        while v >= 0x80 {
            self.write_byte((v as u8) | 0x80)?;
            v >>= 7;
        }
        self.write_byte(v as u8)
    }

    /// Write a string as a vint byte length followed by raw UTF-8 bytes.
    fn write_string(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        self.write_vint(bytes.len() as u32)?;
        self.write_bytes(bytes)
    }
}
