//! Big-endian integer and magic-tag I/O over a byte stream.
//!
//! Every multi-byte field in the SMJPEG format is big-endian regardless of
//! host endianness. This module is the only place that knows that;
//! everything above it reads/writes plain Rust integers.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result, Tag};

/// Read a big-endian `u8` (trivial, but kept for symmetry with `read_u16`/`read_u32`).
pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

pub fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub fn read_i16<R: Read>(r: &mut R) -> Result<i16> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf)?;
    Ok(i16::from_be_bytes(buf))
}

pub fn read_i8<R: Read>(r: &mut R) -> Result<i8> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0] as i8)
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    Ok(w.write_all(&[v])?)
}

pub fn write_u16<W: Write>(w: &mut W, v: u16) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_i16<W: Write>(w: &mut W, v: i16) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_i8<W: Write>(w: &mut W, v: i8) -> Result<()> {
    Ok(w.write_all(&[v as u8])?)
}

/// Read exactly `buf.len()` bytes, turning a short read into a `Truncated`
/// error rather than the generic `UnexpectedEof` `io::Error`.
pub fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::Truncated(
            format!("expected {} bytes, stream ended early", buf.len()),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Read a 4-byte tag (`"_SND"`, `"vidD"`, ...).
pub fn read_tag<R: Read>(r: &mut R) -> Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Read a 4-byte tag, returning `Ok(None)` on a clean EOF (zero bytes read
/// before hitting end of stream) rather than erroring. Used at chunk
/// boundaries, where hitting EOF instead of `"DONE"` is a recoverable,
/// reportable condition rather than a hard error.
pub fn try_read_tag<R: Read>(r: &mut R) -> Result<Option<[u8; 4]>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    loop {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(Error::Truncated(format!(
                    "expected 4-byte tag, got {filled} bytes before EOF"
                )));
            }
            Ok(n) => {
                filled += n;
                if filled == 4 {
                    return Ok(Some(buf));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Compare a 4-byte buffer against an expected ASCII tag.
pub fn magic_equals(buf: &[u8; 4], tag: &str) -> bool {
    buf == tag.as_bytes()
}

/// Require a 4-byte tag to equal an expected ASCII string, producing a
/// `BadMagic` error with both sides formatted for diagnostics otherwise.
pub fn expect_tag<R: Read>(r: &mut R, expected: &str) -> Result<()> {
    let found = read_tag(r)?;
    if magic_equals(&found, expected) {
        Ok(())
    } else {
        Err(Error::BadMagic {
            expected: Tag::from(expected),
            found: Tag::from(found),
        })
    }
}

pub fn write_tag<W: Write>(w: &mut W, tag: &str) -> Result<()> {
    debug_assert_eq!(tag.len(), 4, "SMJPEG tags are always 4 bytes");
    Ok(w.write_all(tag.as_bytes())?)
}

/// Discard exactly `n` bytes from a plain `Read`, for streams that can't
/// `Seek` (header parsing skips an unrecognized track's body this way
/// rather than requiring the whole stream to be seekable).
pub fn skip<R: Read>(r: &mut R, n: u64) -> Result<()> {
    let copied = io::copy(&mut r.take(n), &mut io::sink())?;
    if copied != n {
        return Err(Error::Truncated(format!(
            "expected to skip {n} bytes, stream ended after {copied}"
        )));
    }
    Ok(())
}

/// Seek relative to the current position.
pub fn seek_cur<S: Seek>(s: &mut S, delta: i64) -> Result<u64> {
    Ok(s.seek(SeekFrom::Current(delta))?)
}

/// Seek to an absolute offset.
pub fn seek_set<S: Seek>(s: &mut S, abs: u64) -> Result<u64> {
    Ok(s.seek(SeekFrom::Start(abs))?)
}

/// Current stream position.
pub fn tell<S: Seek>(s: &mut S) -> Result<u64> {
    Ok(s.seek(SeekFrom::Current(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_big_endian_integers() {
        let mut buf = Vec::new();
        write_u8(&mut buf, 0xAB).unwrap();
        write_u16(&mut buf, 0x1234).unwrap();
        write_u32(&mut buf, 0xDEADBEEF).unwrap();
        write_i16(&mut buf, -100).unwrap();
        write_i8(&mut buf, -1).unwrap();

        assert_eq!(buf, vec![0xAB, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0x9C, 0xFF]);

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u8(&mut cursor).unwrap(), 0xAB);
        assert_eq!(read_u16(&mut cursor).unwrap(), 0x1234);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xDEADBEEF);
        assert_eq!(read_i16(&mut cursor).unwrap(), -100);
        assert_eq!(read_i8(&mut cursor).unwrap(), -1);
    }

    #[test]
    fn short_read_is_truncated_error() {
        let mut cursor = Cursor::new(vec![0x00, 0x01]);
        let err = read_u32(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn try_read_tag_returns_none_on_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(try_read_tag(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn try_read_tag_errors_on_partial_tag() {
        let mut cursor = Cursor::new(vec![b'D', b'O']);
        let err = try_read_tag(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn skip_advances_past_the_requested_bytes() {
        let mut cursor = Cursor::new(b"xxxxHEND".to_vec());
        skip(&mut cursor, 4).unwrap();
        assert_eq!(read_tag(&mut cursor).unwrap(), *b"HEND");
    }

    #[test]
    fn skip_past_end_of_stream_is_truncated() {
        let mut cursor = Cursor::new(b"xx".to_vec());
        assert!(matches!(skip(&mut cursor, 4), Err(Error::Truncated(_))));
    }

    #[test]
    fn expect_tag_mismatches_report_both_sides() {
        let mut cursor = Cursor::new(*b"vidD");
        let err = expect_tag(&mut cursor, "HEND").unwrap_err();
        match err {
            Error::BadMagic { expected, found } => {
                assert_eq!(format!("{expected:?}"), "\"HEND\"");
                assert_eq!(format!("{found:?}"), "\"vidD\"");
            }
            _ => panic!("wrong error variant"),
        }
    }
}
