//! Incremental CRC32C (Castagnoli) checksum.
//!
//! Every byte written through a directory output stream is folded into one
//! of these accumulators, and verification tooling recomputes the same
//! value when reading files back. The polynomial is fixed (0x1EDC6F41,
//! reflected input/output, init 0, final XOR 0) and the result is
//! bit-identical whether the underlying implementation uses the hardware
//! CRC instruction or the software table path; `crc32c` selects between
//! them at runtime.

/// Running CRC32C accumulator over an arbitrary byte stream.
///
/// The accumulator is streamable: feeding a byte sequence through any
/// number of `process_bytes` calls, in order, yields the same checksum as
/// a single call over the whole sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create an accumulator with the standard seed of 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create an accumulator continuing from a previously captured value.
    pub fn with_seed(seed: u32) -> Self {
        Crc32 { state: seed }
    }

    /// Fold `buf` into the running checksum.
    pub fn process_bytes(&mut self, buf: &[u8]) {
        self.state = crc32c::crc32c_append(self.state, buf);
    }

    /// Current accumulated value.
    ///
    /// Does not mutate state; it is valid to interleave `checksum` calls
    /// with further `process_bytes` calls to observe prefix checksums.
    pub fn checksum(&self) -> u32 {
        self.state
    }
}
