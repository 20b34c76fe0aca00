//! Loaded-movie descriptor: header parsing and the metadata a caller
//! needs before starting playback, grounded on `SMJPEG_load` in the
//! original decoder.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Result, Status};
use crate::format::{self, AudioHeader, FileHeader, VideoHeader};

/// A loaded SMJPEG stream: parsed headers plus the still-open source,
/// positioned at the start of the data chunks.
pub struct Movie<R> {
    src: R,
    length_ms: u32,
    audio: Option<AudioHeader>,
    video: Option<VideoHeader>,
    /// Offset of the first data chunk, right after `HEND`. Seeking and
    /// rewinding both walk forward from here rather than re-opening the
    /// stream.
    body_start: u64,
    status: Status,
}

impl<R: Read + Seek> Movie<R> {
    /// Parse the file and track headers from `src`, leaving it positioned
    /// at the first data chunk. A track with an unrecognized encoding is
    /// parsed but marked disabled, matching the original's
    /// warn-and-disable behavior rather than failing the whole load.
    pub fn load(mut src: R) -> Result<Self> {
        let (header, warnings) = format::read_file_header(&mut src)?;
        let body_start = src.stream_position()?;

        let mut status = Status::ok();
        for warning in &warnings {
            status = Status::warning(warning.to_string());
        }

        let FileHeader {
            length_ms,
            mut audio,
            mut video,
        } = header;

        if let Some(a) = &audio {
            if !a.is_known_encoding() {
                audio = None;
            }
        }
        if let Some(v) = &video {
            if !v.is_known_encoding() {
                video = None;
            }
        }

        Ok(Movie {
            src,
            length_ms,
            audio,
            video,
            body_start,
            status,
        })
    }

    pub fn length_ms(&self) -> u32 {
        self.length_ms
    }

    pub fn audio(&self) -> Option<&AudioHeader> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&VideoHeader> {
        self.video.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Milliseconds per video frame, derived once at load time from the
    /// overall length and frame count. `None` when there's no video track
    /// or it declares zero frames.
    pub fn ms_per_frame(&self) -> Option<u32> {
        let video = self.video.as_ref()?;
        if video.frames == 0 {
            return None;
        }
        Some(self.length_ms / video.frames)
    }

    pub fn body_start(&self) -> u64 {
        self.body_start
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.src
    }

    /// Seek the underlying stream back to the first data chunk.
    pub fn rewind(&mut self) -> Result<()> {
        self.src.seek(SeekFrom::Start(self.body_start))?;
        Ok(())
    }
}
