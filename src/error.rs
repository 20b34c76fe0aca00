//! Crate-wide error and result types.
//!
//! Decoupled from `anyhow` so downstream libraries linking against `smjpeg`
//! aren't forced to adopt it in their own public APIs; binaries built on top
//! of this crate are free to wrap these in `anyhow` at the call site.

use std::fmt;

use thiserror::Error;

/// `smjpeg`'s crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Short read/write or truncated stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not begin with the SMJPEG signature, or an inner
    /// 4-byte tag is malformed where a specific one was expected.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: Tag, found: Tag },

    /// File-format version is not 0.
    #[error("unsupported SMJPEG version: {0}")]
    BadVersion(u32),

    /// Unknown encoding tag, unsupported pixel format, or an operation
    /// (e.g. doubling on a 24-bit surface) that has no defined behavior.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A row-pointer or buffer allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// `target(x, y)` plus the movie's dimensions exceed the surface.
    #[error("target out of bounds: ({x}, {y}) + {width}x{height} does not fit in {surface_width}x{surface_height}")]
    TargetOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        surface_width: u32,
        surface_height: u32,
    },

    /// The stream ended before a `"DONE"` marker was read.
    #[error("truncated SMJPEG stream: {0}")]
    Truncated(String),

    /// A track header's declared body length doesn't match the fixed size
    /// that track kind always has.
    #[error("bad header length for {tag:?}: expected {expected}, found {found}")]
    BadHeaderLength { tag: Tag, expected: u32, found: u32 },
}

/// A 4-byte container tag (`"_SND"`, `"vidD"`, `"DONE"`, ...), printable as
/// ASCII when possible and as hex otherwise.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tag(pub [u8; 4]);

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "\"{}\"", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "{:02x?}", self.0)
        }
    }
}

impl From<&[u8; 4]> for Tag {
    fn from(bytes: &[u8; 4]) -> Self {
        Tag(*bytes)
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Tag(bytes)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; 4];
        let src = s.as_bytes();
        let n = src.len().min(4);
        bytes[..n].copy_from_slice(&src[..n]);
        Tag(bytes)
    }
}

/// Status block mirroring the original C API's `{code, message}` pair.
///
/// `code == 0` means "no error" (possibly a warning message still set,
/// e.g. an unknown track encoding); `code != 0` means the last operation
/// failed and `message` explains why.
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub code: i32,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: message.into(),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self {
            code: -1,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_debug_prints_ascii() {
        let tag = Tag::from("HEND");
        assert_eq!(format!("{tag:?}"), "\"HEND\"");
    }

    #[test]
    fn tag_debug_prints_hex_for_non_ascii() {
        let tag = Tag::from([0x00, 0x0A, 0xFF, 0x01]);
        assert_eq!(format!("{tag:?}"), "[00, 0a, ff, 01]");
    }

    #[test]
    fn status_from_error_is_negative_code() {
        let err = Error::BadVersion(7);
        let status = Status::from_error(&err);
        assert_eq!(status.code, -1);
        assert!(status.message.contains('7'));
    }
}
