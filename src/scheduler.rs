//! The playback scheduler: chunk-by-chunk advance with the original's
//! wait/skip/early-return state machine, grounded on
//! `ParseBlock`/`SMJPEG_advance`/`SMJPEG_seek`/`SMJPEG_feedaudio` in the
//! original decoder.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::adpcm::{self, AdpcmState};
use crate::byteio;
use crate::colorspace::{self, Target};
use crate::error::{Error, Result};
use crate::format::{self, ChunkKind, NextTag, AUDIO_MAX_CHUNK, LATE_TOLERANCE_MS};
use crate::jpeg_source::JpegSource;
use crate::movie::Movie;
use crate::ring::Ring;
use crate::surface::VideoSurface;

/// OS timeslice, in milliseconds, subtracted from a video wait so the
/// scheduler wakes up slightly early rather than slightly late.
const TIMESLICE_MS: u32 = 10;

/// Configuration for a playback session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackOpts {
    pub use_timing: bool,
}

enum BlockOutcome {
    Played,
    Skipped,
    EarlyReturn,
}

/// Drives playback of a loaded [`Movie`]: advances chunk by chunk,
/// decodes video into an attached [`VideoSurface`], and queues decoded
/// audio into a ring buffer a separate audio thread can drain.
pub struct Scheduler<R> {
    movie: Movie<R>,
    ring: Arc<Ring>,
    at_end: bool,
    use_timing: bool,
    playback_start: Option<Instant>,
    current_ms: u32,
    video_frame: u32,
    target: Option<Target>,
    surface: Option<Box<dyn VideoSurface>>,
}

impl<R: Read + Seek> Scheduler<R> {
    pub fn new(movie: Movie<R>) -> Self {
        Scheduler {
            movie,
            ring: Arc::new(Ring::new()),
            at_end: true,
            use_timing: false,
            playback_start: None,
            current_ms: 0,
            video_frame: 0,
            target: None,
            surface: None,
        }
    }

    pub fn movie(&self) -> &Movie<R> {
        &self.movie
    }

    /// A handle to the audio ring buffer, to be handed to whatever
    /// drives the real audio output (a callback thread, typically); see
    /// `feed_audio` for the consumer side used in-process.
    pub fn ring(&self) -> Arc<Ring> {
        Arc::clone(&self.ring)
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn current_position_ms(&self) -> u32 {
        self.current_ms
    }

    pub fn current_video_frame(&self) -> u32 {
        self.video_frame
    }

    /// Attach a display target. Bounds-checks the movie's (optionally
    /// doubled) dimensions against the surface the way `SMJPEG_target`
    /// validates `target->w`/`target->h`.
    pub fn set_target(&mut self, surface: Box<dyn VideoSurface>, doubled: bool) -> Result<()> {
        let video = self
            .movie
            .video()
            .ok_or_else(|| Error::Unsupported("movie has no video track".into()))?;
        let (movie_w, movie_h) = (video.width as u32, video.height as u32);
        let (surface_w, surface_h) = surface.dimensions();
        check_bounds(movie_w, movie_h, doubled, surface_w, surface_h)?;

        let format = colorspace::classify(
            surface.bits_per_pixel(),
            surface.red_mask(),
            surface.green_mask(),
            surface.blue_mask(),
        )?;
        self.target = Some(Target::new(format, doubled)?);
        self.surface = Some(surface);
        Ok(())
    }

    /// Toggle 2x doubling on the currently attached target. Re-validates
    /// against the surface, matching the original's requirement to
    /// re-call `SMJPEG_target` after `SMJPEG_double`.
    pub fn set_doubled(&mut self, doubled: bool) -> Result<()> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| Error::Unsupported("no display target attached".into()))?;
        let video = self
            .movie
            .video()
            .ok_or_else(|| Error::Unsupported("movie has no video track".into()))?;
        check_bounds(
            video.width as u32,
            video.height as u32,
            doubled,
            surface.dimensions().0,
            surface.dimensions().1,
        )?;
        let format = colorspace::classify(
            surface.bits_per_pixel(),
            surface.red_mask(),
            surface.green_mask(),
            surface.blue_mask(),
        )?;
        self.target = Some(Target::new(format, doubled)?);
        Ok(())
    }

    pub fn start(&mut self, use_timing: bool) {
        self.use_timing = use_timing;
        self.playback_start = if use_timing { Some(Instant::now()) } else { None };
        self.at_end = false;
    }

    /// Block until the audio ring has drained, then mark the movie as
    /// stopped. Only waits when an enabled audio track exists — mirrors
    /// `SMJPEG_stop`'s `ring.used > 0 && audio.enabled` guard, so a
    /// video-only movie (or one with no live consumer thread) never
    /// blocks here.
    pub fn stop(&mut self) {
        if self.movie.audio().is_some() {
            while !self.ring.is_empty() {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        self.at_end = true;
    }

    pub fn feed_audio(&self, dst: &mut [u8]) -> usize {
        self.ring.feed(dst)
    }

    pub fn get_position(&mut self) -> Result<u64> {
        Ok(self.movie.reader_mut().stream_position()?)
    }

    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        self.movie.reader_mut().seek(SeekFrom::Start(pos))?;
        self.at_end = false;
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0)
    }

    /// Seek to the first chunk whose timestamp is `>= ms`, by walking
    /// forward from the start of the stream (a coarse forward
    /// header-walk, no index). Leaves the movie stopped — callers must
    /// `start()` again to resume playback, matching the original's
    /// behavior of always setting `at_end` after a seek.
    pub fn seek(&mut self, ms: u32) -> Result<()> {
        tracing::debug!(target_ms = ms, "seeking");
        self.ring = Arc::new(Ring::new());
        self.movie.rewind()?;
        self.current_ms = 0;
        self.video_frame = 0;
        self.at_end = false;

        loop {
            match format::peek_tag(self.movie.reader_mut())? {
                NextTag::End => break,
                NextTag::Chunk(kind) => {
                    let timestamp = byteio::read_u32(self.movie.reader_mut())?;
                    let body_len = byteio::read_u32(self.movie.reader_mut())?;
                    if timestamp >= ms {
                        byteio::seek_cur(self.movie.reader_mut(), -12)?;
                        self.current_ms = timestamp;
                        break;
                    }
                    if kind == ChunkKind::Video {
                        self.video_frame += 1;
                    }
                    self.current_ms = timestamp;
                    byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                }
                NextTag::Unknown(_) => {
                    let _timestamp = byteio::read_u32(self.movie.reader_mut())?;
                    let body_len = byteio::read_u32(self.movie.reader_mut())?;
                    byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                }
            }
        }

        self.at_end = true;
        Ok(())
    }

    /// Advance `num_frames` played chunks (a negative count means "play
    /// to the end of the stream"), returning whether the last chunk
    /// processed was actually played (as opposed to skipped or an early
    /// return from a timing wait).
    pub fn advance(&mut self, num_frames: i64, do_wait: bool) -> Result<bool> {
        let mut remaining = if num_frames < 0 { i64::MAX } else { num_frames };
        let mut played_last = false;

        while remaining > 0 && !self.at_end {
            match self.parse_block(do_wait)? {
                BlockOutcome::Played => {
                    remaining -= 1;
                    played_last = true;
                }
                BlockOutcome::Skipped => played_last = false,
                BlockOutcome::EarlyReturn => {
                    remaining = 0;
                    played_last = false;
                }
            }
        }
        Ok(played_last)
    }

    fn elapsed_ms(&self) -> u32 {
        self.playback_start
            .map(|t| t.elapsed().as_millis() as u32)
            .unwrap_or(0)
    }

    fn parse_block(&mut self, do_wait: bool) -> Result<BlockOutcome> {
        let chunk_kind = match format::peek_tag(self.movie.reader_mut())? {
            NextTag::End => {
                self.at_end = true;
                return Ok(BlockOutcome::EarlyReturn);
            }
            NextTag::Chunk(kind) => Some(kind),
            NextTag::Unknown(_) => None,
        };

        let timestamp_ms = byteio::read_u32(self.movie.reader_mut())?;
        let body_len = byteio::read_u32(self.movie.reader_mut())?;

        if chunk_kind == Some(ChunkKind::Video) {
            self.video_frame += 1;
        }

        let max_timestamp = timestamp_ms.saturating_add(LATE_TOLERANCE_MS);
        let mut timenow_ms = 0u32;
        if self.use_timing {
            timenow_ms = self.elapsed_ms();
            if timenow_ms > max_timestamp {
                tracing::warn!(
                    timestamp_ms,
                    timenow_ms,
                    late_by_ms = timenow_ms - timestamp_ms,
                    "chunk arrived too late, dropping"
                );
                byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                return Ok(BlockOutcome::Skipped);
            }
        }
        self.current_ms = timestamp_ms;

        match chunk_kind {
            Some(ChunkKind::Audio) => {
                self.parse_audio(body_len)?;
                Ok(BlockOutcome::Played)
            }
            Some(ChunkKind::Video) => {
                if self.use_timing && timenow_ms < timestamp_ms {
                    if do_wait {
                        let timediff = timestamp_ms - timenow_ms;
                        if timediff > TIMESLICE_MS {
                            std::thread::sleep(Duration::from_millis(
                                (timediff - TIMESLICE_MS) as u64,
                            ));
                        }
                    } else {
                        tracing::debug!(
                            timestamp_ms,
                            timenow_ms,
                            "video chunk is still in the future, returning early"
                        );
                        byteio::seek_cur(self.movie.reader_mut(), -12)?;
                        self.video_frame -= 1;
                        return Ok(BlockOutcome::EarlyReturn);
                    }
                }
                self.parse_video(body_len)?;
                Ok(BlockOutcome::Played)
            }
            None => {
                byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                Ok(BlockOutcome::Skipped)
            }
        }
    }

    fn parse_audio(&mut self, mut body_len: u32) -> Result<()> {
        let at_end = self.at_end;
        self.ring.wait_while_full(|| at_end);

        let mut extra = 0u32;
        if body_len > AUDIO_MAX_CHUNK as u32 {
            extra = body_len - AUDIO_MAX_CHUNK as u32;
            body_len = AUDIO_MAX_CHUNK as u32;
        }

        let is_adpcm = self.movie.audio().map(|a| a.is_adpcm()).unwrap_or(false);
        if is_adpcm {
            let valprev = byteio::read_i16(self.movie.reader_mut())?;
            let index = byteio::read_i8(self.movie.reader_mut())?;
            let _unused = byteio::read_u8(self.movie.reader_mut())?;
            let encoded_len = body_len.saturating_sub(4) as usize;
            let mut encoded = vec![0u8; encoded_len];
            byteio::read_exact(self.movie.reader_mut(), &mut encoded)?;

            let mut state = AdpcmState { valprev, index };
            let samples = adpcm::decode(&encoded, &mut state);
            let mut pcm = Vec::with_capacity(samples.len() * 2);
            for sample in samples {
                pcm.extend_from_slice(&sample.to_ne_bytes());
            }
            // A decoded packet can be several times larger than one
            // ring slot; split across as many slots as it takes rather
            // than overflowing a single fixed-size buffer.
            for slice in pcm.chunks(AUDIO_MAX_CHUNK) {
                let at_end = self.at_end;
                self.ring.wait_while_full(|| at_end);
                self.ring.push(slice);
            }
        } else {
            let mut raw = vec![0u8; body_len as usize];
            byteio::read_exact(self.movie.reader_mut(), &mut raw)?;
            self.ring.push(&raw);
        }

        if extra > 0 {
            byteio::seek_cur(self.movie.reader_mut(), extra as i64)?;
        }
        Ok(())
    }

    fn parse_video(&mut self, body_len: u32) -> Result<()> {
        let target = match self.target {
            Some(target) => target,
            None => {
                byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                return Ok(());
            }
        };
        let surface = match self.surface.as_mut() {
            Some(surface) => surface,
            None => {
                byteio::seek_cur(self.movie.reader_mut(), body_len as i64)?;
                return Ok(());
            }
        };

        let mut source = JpegSource::new(self.movie.reader_mut(), body_len);
        let mut decoder = jpeg_decoder::Decoder::new(&mut source);
        let pixels = decoder
            .decode()
            .map_err(|e| Error::Unsupported(format!("jpeg decode failed: {e}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| Error::Unsupported("jpeg decoder produced no image info".into()))?;
        let leftover = source.remaining();
        drop(source);
        if leftover > 0 {
            byteio::seek_cur(self.movie.reader_mut(), leftover as i64)?;
        }

        let rgb = to_rgb24(&pixels, info.pixel_format, info.width as usize * info.height as usize)?;

        let width = info.width as u32;
        let height = info.height as u32;
        let pitch = surface.pitch();
        let bpp = target.format.bytes_per_pixel();
        let row_bytes = width as usize * bpp;

        surface.lock();
        {
            let buf = surface.pixels_mut();
            for y in 0..height as usize {
                let src_row = &rgb[y * width as usize * 3..(y + 1) * width as usize * 3];
                let dst_start = if target.doubled { y * 2 * pitch } else { y * pitch };
                colorspace::convert_row(src_row, width, target, &mut buf[dst_start..]);
                if target.doubled {
                    let doubled_row_bytes = row_bytes * 2;
                    let (before, after) = buf.split_at_mut(dst_start + pitch);
                    after[..doubled_row_bytes.min(pitch)]
                        .copy_from_slice(&before[dst_start..dst_start + doubled_row_bytes.min(pitch)]);
                }
            }
        }
        surface.unlock();
        surface.notify_updated(0, 0, target.output_width(width), target.output_height(height));

        Ok(())
    }
}

fn check_bounds(
    movie_w: u32,
    movie_h: u32,
    doubled: bool,
    surface_w: u32,
    surface_h: u32,
) -> Result<()> {
    let (needed_w, needed_h) = if doubled {
        (movie_w * 2, movie_h * 2)
    } else {
        (movie_w, movie_h)
    };
    if needed_w > surface_w || needed_h > surface_h {
        return Err(Error::TargetOutOfBounds {
            x: 0,
            y: 0,
            width: needed_w,
            height: needed_h,
            surface_width: surface_w,
            surface_height: surface_h,
        });
    }
    Ok(())
}

fn to_rgb24(
    pixels: &[u8],
    format: jpeg_decoder::PixelFormat,
    pixel_count: usize,
) -> Result<Vec<u8>> {
    match format {
        jpeg_decoder::PixelFormat::RGB24 => Ok(pixels.to_vec()),
        jpeg_decoder::PixelFormat::L8 => {
            let mut out = Vec::with_capacity(pixel_count * 3);
            for &gray in pixels.iter().take(pixel_count) {
                out.extend_from_slice(&[gray, gray, gray]);
            }
            Ok(out)
        }
        other => Err(Error::Unsupported(format!(
            "unsupported JPEG pixel format: {other:?}"
        ))),
    }
}
