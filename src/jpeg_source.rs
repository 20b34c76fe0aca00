//! A `Read` adapter that exposes exactly one video chunk's bytes to a
//! JPEG decoder, synthesizing an end-of-image marker if the underlying
//! stream runs dry before the chunk's declared length is exhausted
//! (grounded on `jpegsrc_fill` in the original decoder).

use std::io::{self, Read};

/// End-of-image marker SMJPEG inserts when a chunk is truncated, so a
/// JPEG decoder sees a structurally complete image instead of erroring
/// mid-stream.
const FAKE_EOI: [u8; 2] = [0xFF, 0xD9];

/// Wraps `&mut R` and limits reads to `length` bytes, then serves a
/// synthetic EOI marker instead of reporting EOF.
pub struct JpegSource<'a, R: Read> {
    inner: &'a mut R,
    remaining: u32,
    eoi_sent: bool,
}

impl<'a, R: Read> JpegSource<'a, R> {
    pub fn new(inner: &'a mut R, length: u32) -> Self {
        JpegSource {
            inner,
            remaining: length,
            eoi_sent: false,
        }
    }

    /// Bytes of the declared chunk body not yet consumed by `read` calls
    /// (including bytes that would still need to be skipped if the
    /// caller stops reading before exhausting the chunk).
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl<R: Read> Read for JpegSource<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            if self.eoi_sent || buf.is_empty() {
                return Ok(0);
            }
            let n = FAKE_EOI.len().min(buf.len());
            buf[..n].copy_from_slice(&FAKE_EOI[..n]);
            if n == FAKE_EOI.len() {
                self.eoi_sent = true;
            } else {
                // Caller's buffer was smaller than the marker; remember
                // to hand out the rest of it next call.
                self.remaining = 0;
            }
            return Ok(n);
        }

        let want = (buf.len() as u64).min(self.remaining as u64) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            // Inner stream ran dry before the declared chunk length was
            // exhausted; treat the rest of the chunk as already consumed
            // so the next read serves the synthetic EOI instead of a
            // real EOF.
            self.remaining = 0;
            return self.read(buf);
        }
        self.remaining -= n as u32;
        Ok(n)
    }
}
