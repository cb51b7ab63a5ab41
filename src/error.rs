//! Error types for segdir.
//!
//! Uses thiserror for derive macros. Expected conditions (lock contention,
//! a clean end of stream during `read_bytes`, malformed lock-file content)
//! are not errors; they are reported as `Ok(false)` or short reads. The
//! variants here cover the failures a caller may want to inspect.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for segdir operations.
#[derive(Error, Debug)]
pub enum SegdirError {
    /// An OS-level I/O call failed against a specific path.
    #[error("i/o failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Hostname resolution failed on this machine.
    #[error("failed to resolve hostname: {0}")]
    Hostname(#[source] std::io::Error),

    /// A fixed-width read was requested past the end of the stream.
    ///
    /// `read_bytes` never produces this; it short-reads instead. Only the
    /// primitive readers (`read_byte`, `read_int`, ...) fail this way,
    /// because a partial integer is never meaningful.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A varint ran past its maximum encoded width without terminating.
    #[error("malformed varint encoding")]
    MalformedVarint,

    /// A length-prefixed string did not decode as UTF-8.
    #[error("string payload is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The named file does not exist in the directory.
    #[error("no such file in directory: '{0}'")]
    FileNotFound(String),
}

impl SegdirError {
    /// Wrap an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SegdirError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for segdir operations.
pub type Result<T> = std::result::Result<T, SegdirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = SegdirError::io(
            "/tmp/seg/lock",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/seg/lock"));
    }

    #[test]
    fn eof_error_is_descriptive() {
        assert_eq!(
            SegdirError::UnexpectedEof.to_string(),
            "unexpected end of stream"
        );
    }

    #[test]
    fn file_not_found_names_the_file() {
        let err = SegdirError::FileNotFound("segments_1".to_string());
        assert!(err.to_string().contains("segments_1"));
    }
}
