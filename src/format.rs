//! The on-disk SMJPEG container model: magic numbers, header descriptors,
//! and the shared header read/write routines used by both the muxer and
//! the movie reader.

use std::io::{Read, Write};

use crate::byteio;
use crate::error::{Error, Result};

/// `"\0\nSMJPEG"`, the 8-byte file signature.
pub const FILE_MAGIC: [u8; 8] = [0x00, b'\n', b'S', b'M', b'J', b'P', b'E', b'G'];

pub const FORMAT_VERSION: u32 = 0;

pub const AUDIO_HEADER_TAG: &str = "_SND";
pub const VIDEO_HEADER_TAG: &str = "_VID";
pub const HEADER_END_TAG: &str = "HEND";
pub const AUDIO_DATA_TAG: &str = "sndD";
pub const VIDEO_DATA_TAG: &str = "vidD";
pub const DATA_END_TAG: &str = "DONE";

pub const AUDIO_ENCODING_NONE: &str = "NONE";
pub const AUDIO_ENCODING_ADPCM: &str = "APCM";
pub const VIDEO_ENCODING_JPEG: &str = "JFIF";

/// 32 outstanding chunks, 4096 bytes each — the original's fixed ring
/// buffer dimensions, kept as named constants since the scheduler, ring,
/// and movie loader all need to agree on them.
pub const AUDIO_RING_SLOTS: usize = 32;
pub const AUDIO_MAX_CHUNK: usize = 4096;

/// Samples encoded per audio frame by the muxer.
pub const AUDIO_FRAME_SAMPLES: u32 = 512;

/// Lateness tolerance window, in milliseconds, before a chunk is
/// considered too late to play.
pub const LATE_TOLERANCE_MS: u32 = 90;

/// An audio track's parsed header fields.
#[derive(Debug, Clone)]
pub struct AudioHeader {
    pub rate: u16,
    pub bits: u8,
    pub channels: u8,
    pub encoding: [u8; 4],
}

impl AudioHeader {
    pub fn is_adpcm(&self) -> bool {
        byteio::magic_equals(&self.encoding, AUDIO_ENCODING_ADPCM)
    }

    pub fn is_known_encoding(&self) -> bool {
        byteio::magic_equals(&self.encoding, AUDIO_ENCODING_NONE) || self.is_adpcm()
    }
}

/// A video track's parsed header fields.
#[derive(Debug, Clone)]
pub struct VideoHeader {
    pub frames: u32,
    pub width: u16,
    pub height: u16,
    pub encoding: [u8; 4],
}

impl VideoHeader {
    pub fn is_known_encoding(&self) -> bool {
        byteio::magic_equals(&self.encoding, VIDEO_ENCODING_JPEG)
    }
}

/// The file-level header: overall length plus zero or more track headers,
/// terminated by `HEND`.
#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    pub length_ms: u32,
    pub audio: Option<AudioHeader>,
    pub video: Option<VideoHeader>,
}

/// A warning surfaced while parsing a header (unknown track encoding),
/// mirroring the original's non-fatal `SMJPEG_status(movie, 0, ...)` calls.
#[derive(Debug, Clone)]
pub enum HeaderWarning {
    UnknownAudioEncoding([u8; 4]),
    UnknownVideoEncoding([u8; 4]),
}

impl std::fmt::Display for HeaderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderWarning::UnknownAudioEncoding(tag) => {
                write!(f, "unknown audio encoding {:?}", crate::error::Tag::from(*tag))
            }
            HeaderWarning::UnknownVideoEncoding(tag) => {
                write!(f, "unknown video encoding {:?}", crate::error::Tag::from(*tag))
            }
        }
    }
}

/// Read and validate the 8-byte signature plus version field. Leaves the
/// stream positioned right after the version, at the overall-length field.
pub fn read_signature<R: Read>(r: &mut R) -> Result<()> {
    let mut buf = [0u8; 8];
    byteio::read_exact(r, &mut buf)?;
    if buf != FILE_MAGIC {
        return Err(Error::BadMagic {
            expected: crate::error::Tag::from(&FILE_MAGIC[4..8].try_into().unwrap()),
            found: crate::error::Tag::from(&buf[4..8].try_into().unwrap()),
        });
    }
    let version = byteio::read_u32(r)?;
    if version != FORMAT_VERSION {
        return Err(Error::BadVersion(version));
    }
    Ok(())
}

/// Parse the file header: length, then a sequence of track headers up to
/// and including `HEND`. Unknown track encodings are reported as warnings
/// rather than failing the whole load — they disable that track, not the
/// whole load.
pub fn read_file_header<R: Read>(r: &mut R) -> Result<(FileHeader, Vec<HeaderWarning>)> {
    read_signature(r)?;
    let mut header = FileHeader {
        length_ms: byteio::read_u32(r)?,
        audio: None,
        video: None,
    };
    let mut warnings = Vec::new();

    loop {
        let tag = byteio::read_tag(r)?;
        if byteio::magic_equals(&tag, HEADER_END_TAG) {
            break;
        }
        if byteio::magic_equals(&tag, AUDIO_HEADER_TAG) {
            let body_len = byteio::read_u32(r)?;
            if body_len != 8 {
                return Err(Error::BadHeaderLength {
                    tag: crate::error::Tag::from(AUDIO_HEADER_TAG),
                    expected: 8,
                    found: body_len,
                });
            }
            let rate = byteio::read_u16(r)?;
            let bits = byteio::read_u8(r)?;
            let channels = byteio::read_u8(r)?;
            let encoding = byteio::read_tag(r)?;
            let known = byteio::magic_equals(&encoding, AUDIO_ENCODING_NONE)
                || byteio::magic_equals(&encoding, AUDIO_ENCODING_ADPCM);
            if !known {
                tracing::warn!(
                    encoding = ?crate::error::Tag::from(encoding),
                    "unknown audio encoding, disabling audio track"
                );
                warnings.push(HeaderWarning::UnknownAudioEncoding(encoding));
            }
            header.audio = Some(AudioHeader {
                rate,
                bits,
                channels,
                encoding,
            });
            continue;
        }
        if byteio::magic_equals(&tag, VIDEO_HEADER_TAG) {
            let body_len = byteio::read_u32(r)?;
            if body_len != 12 {
                return Err(Error::BadHeaderLength {
                    tag: crate::error::Tag::from(VIDEO_HEADER_TAG),
                    expected: 12,
                    found: body_len,
                });
            }
            let frames = byteio::read_u32(r)?;
            let width = byteio::read_u16(r)?;
            let height = byteio::read_u16(r)?;
            let encoding = byteio::read_tag(r)?;
            let known = byteio::magic_equals(&encoding, VIDEO_ENCODING_JPEG);
            if !known {
                tracing::warn!(
                    encoding = ?crate::error::Tag::from(encoding),
                    "unknown video encoding, disabling video track"
                );
                warnings.push(HeaderWarning::UnknownVideoEncoding(encoding));
            }
            header.video = Some(VideoHeader {
                frames,
                width,
                height,
                encoding,
            });
            continue;
        }

        // An unrecognized track kind: skip its body and keep scanning for
        // HEND, rather than failing the whole load.
        let body_len = byteio::read_u32(r)?;
        tracing::warn!(
            tag = ?crate::error::Tag::from(tag),
            body_len,
            "unrecognized track header, skipping"
        );
        byteio::skip(r, body_len as u64)?;
    }

    tracing::debug!(
        length_ms = header.length_ms,
        has_audio = header.audio.is_some(),
        has_video = header.video.is_some(),
        warnings = warnings.len(),
        "parsed file header"
    );

    Ok((header, warnings))
}

pub fn write_signature<W: Write>(w: &mut W, length_ms: u32) -> Result<()> {
    w.write_all(&FILE_MAGIC)?;
    byteio::write_u32(w, FORMAT_VERSION)?;
    byteio::write_u32(w, length_ms)?;
    Ok(())
}

pub fn write_audio_header<W: Write>(w: &mut W, header: &AudioHeader) -> Result<()> {
    byteio::write_tag(w, AUDIO_HEADER_TAG)?;
    byteio::write_u32(w, 8)?;
    byteio::write_u16(w, header.rate)?;
    byteio::write_u8(w, header.bits)?;
    byteio::write_u8(w, header.channels)?;
    w.write_all(&header.encoding)?;
    Ok(())
}

pub fn write_video_header<W: Write>(w: &mut W, header: &VideoHeader) -> Result<()> {
    byteio::write_tag(w, VIDEO_HEADER_TAG)?;
    byteio::write_u32(w, 12)?;
    byteio::write_u32(w, header.frames)?;
    byteio::write_u16(w, header.width)?;
    byteio::write_u16(w, header.height)?;
    w.write_all(&header.encoding)?;
    Ok(())
}

pub fn write_header_end<W: Write>(w: &mut W) -> Result<()> {
    byteio::write_tag(w, HEADER_END_TAG)
}

pub fn write_data_end<W: Write>(w: &mut W) -> Result<()> {
    byteio::write_tag(w, DATA_END_TAG)
}

/// One parsed data-chunk header: which stream it belongs to, its
/// timestamp, and the byte length of its body still left to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub kind: ChunkKind,
    pub timestamp_ms: u32,
    pub body_len: u32,
}

/// Outcome of peeking at the next chunk tag.
pub enum NextTag {
    Chunk(ChunkKind),
    Unknown([u8; 4]),
    End,
}

pub fn peek_tag<R: Read>(r: &mut R) -> Result<NextTag> {
    match byteio::try_read_tag(r)? {
        None => Ok(NextTag::End),
        Some(tag) if byteio::magic_equals(&tag, DATA_END_TAG) => Ok(NextTag::End),
        Some(tag) if byteio::magic_equals(&tag, AUDIO_DATA_TAG) => {
            Ok(NextTag::Chunk(ChunkKind::Audio))
        }
        Some(tag) if byteio::magic_equals(&tag, VIDEO_DATA_TAG) => {
            Ok(NextTag::Chunk(ChunkKind::Video))
        }
        Some(tag) => Ok(NextTag::Unknown(tag)),
    }
}

/// Read a chunk's timestamp and body length, having already consumed its
/// 4-byte tag (via `peek_tag`).
pub fn read_chunk_prologue<R: Read>(r: &mut R, kind: ChunkKind) -> Result<ChunkHeader> {
    let timestamp_ms = byteio::read_u32(r)?;
    let body_len = byteio::read_u32(r)?;
    Ok(ChunkHeader {
        kind,
        timestamp_ms,
        body_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        write_signature(&mut buf, 1000).unwrap();
        write_audio_header(
            &mut buf,
            &AudioHeader {
                rate: 22050,
                bits: 16,
                channels: 1,
                encoding: *b"APCM",
            },
        )
        .unwrap();
        write_video_header(
            &mut buf,
            &VideoHeader {
                frames: 15,
                width: 320,
                height: 240,
                encoding: *b"JFIF",
            },
        )
        .unwrap();
        write_header_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trips_a_full_header() {
        let bytes = sample_header_bytes();
        let mut cursor = Cursor::new(bytes);
        let (header, warnings) = read_file_header(&mut cursor).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(header.length_ms, 1000);
        let audio = header.audio.unwrap();
        assert_eq!(audio.rate, 22050);
        assert!(audio.is_adpcm());
        let video = header.video.unwrap();
        assert_eq!(video.frames, 15);
        assert_eq!((video.width, video.height), (320, 240));
        assert!(video.is_known_encoding());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        assert!(matches!(
            read_signature(&mut cursor),
            Err(Error::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FILE_MAGIC);
        byteio::write_u32(&mut buf, 1).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_signature(&mut cursor),
            Err(Error::BadVersion(1))
        ));
    }

    #[test]
    fn unknown_audio_encoding_is_a_warning_not_an_error() {
        let mut buf = Vec::new();
        write_signature(&mut buf, 0).unwrap();
        write_audio_header(
            &mut buf,
            &AudioHeader {
                rate: 8000,
                bits: 8,
                channels: 1,
                encoding: *b"XXXX",
            },
        )
        .unwrap();
        write_header_end(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let (header, warnings) = read_file_header(&mut cursor).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(!header.audio.unwrap().is_known_encoding());
    }

    #[test]
    fn unrecognized_track_kind_is_skipped_not_rejected() {
        let mut buf = Vec::new();
        write_signature(&mut buf, 0).unwrap();
        // A made-up track kind: tag, a 6-byte body length, then the body.
        buf.extend_from_slice(b"_XYZ");
        byteio::write_u32(&mut buf, 6).unwrap();
        buf.extend_from_slice(b"abcdef");
        write_video_header(
            &mut buf,
            &VideoHeader {
                frames: 2,
                width: 4,
                height: 4,
                encoding: *b"JFIF",
            },
        )
        .unwrap();
        write_header_end(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let (header, _warnings) = read_file_header(&mut cursor).unwrap();
        assert_eq!(header.video.unwrap().frames, 2);
    }

    #[test]
    fn audio_header_length_mismatch_is_rejected() {
        let mut buf = Vec::new();
        write_signature(&mut buf, 0).unwrap();
        buf.extend_from_slice(b"_SND");
        byteio::write_u32(&mut buf, 99).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_file_header(&mut cursor),
            Err(Error::BadHeaderLength { expected: 8, found: 99, .. })
        ));
    }

    #[test]
    fn video_header_length_mismatch_is_rejected() {
        let mut buf = Vec::new();
        write_signature(&mut buf, 0).unwrap();
        buf.extend_from_slice(b"_VID");
        byteio::write_u32(&mut buf, 3).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_file_header(&mut cursor),
            Err(Error::BadHeaderLength { expected: 12, found: 3, .. })
        ));
    }
}
