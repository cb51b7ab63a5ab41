//! Sequential read/write primitives.
//!
//! [`DataOutput`] and [`DataInput`] form a symmetric codec contract for
//! numeric and string values over an abstract byte stream: everything a
//! `write_X` produces, the matching `read_X` reproduces bit-for-bit.
//! Directory backends supply the required byte-level methods; the numeric
//! encodings live in the provided methods so every backend shares them.

mod input;
mod output;

pub use input::DataInput;
pub use output::DataOutput;

/// Maximum encoded width of a `write_vint` value (u32, 7 bits per byte).
pub(crate) const MAX_VINT_BYTES: usize = 5;

/// Maximum encoded width of a `write_vlong` value (u64, 7 bits per byte).
pub(crate) const MAX_VLONG_BYTES: usize = 10;
