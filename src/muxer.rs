//! The writer side: multiplexes a JPEG frame sequence and a mono PCM
//! audio stream into an SMJPEG file, grounded on `smjpeg_encode.c`'s
//! `main` and `WriteAudioChunk`/`WriteVideoChunk`.

use std::io::Write;

use crate::adpcm::{self, AdpcmState};
use crate::byteio;
use crate::error::Result;
use crate::format::{self, AudioHeader, VideoHeader, AUDIO_FRAME_SAMPLES};

/// How the audio track should be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    None,
    Adpcm,
}

impl AudioEncoding {
    fn tag(self) -> &'static str {
        match self {
            AudioEncoding::None => format::AUDIO_ENCODING_NONE,
            AudioEncoding::Adpcm => format::AUDIO_ENCODING_ADPCM,
        }
    }
}

/// Mono PCM audio to multiplex, plus its track parameters.
pub struct AudioInput<'a> {
    pub rate: u16,
    pub bits: u8,
    pub encoding: AudioEncoding,
    pub samples: &'a [i16],
}

/// Everything `encode` needs: an optional audio track and zero or more
/// already-encoded JPEG frames at a fixed frame rate.
pub struct EncodeInputs<'a> {
    pub fps: f64,
    pub video_width: u16,
    pub video_height: u16,
    /// One already-encoded JPEG buffer per frame.
    pub video_frames: &'a [Vec<u8>],
    pub audio: Option<AudioInput<'a>>,
}

/// Multiplex `inputs` into `w`, writing a complete SMJPEG stream
/// including the trailing `DONE` marker.
pub fn encode<W: Write>(w: &mut W, inputs: &EncodeInputs<'_>) -> Result<()> {
    let video_nframes = inputs.video_frames.len() as u32;
    let length_ms = if video_nframes > 0 {
        ((video_nframes as f64 / inputs.fps) * 1000.0) as u32
    } else {
        0
    };

    format::write_signature(w, length_ms)?;

    if let Some(audio) = &inputs.audio {
        format::write_audio_header(
            w,
            &AudioHeader {
                rate: audio.rate,
                bits: audio.bits,
                channels: 1,
                encoding: {
                    let mut tag = [0u8; 4];
                    tag.copy_from_slice(audio.encoding.tag().as_bytes());
                    tag
                },
            },
        )?;
    }
    if video_nframes > 0 {
        format::write_video_header(
            w,
            &VideoHeader {
                frames: video_nframes,
                width: inputs.video_width,
                height: inputs.video_height,
                encoding: *b"JFIF",
            },
        )?;
    }
    format::write_header_end(w)?;

    let ms_per_video_frame = 1000.0 / inputs.fps;
    let ms_per_audio_frame = inputs
        .audio
        .as_ref()
        .map(|a| (1000.0 * AUDIO_FRAME_SAMPLES as f64) / a.rate as f64)
        .unwrap_or(0.0);

    let mut audio_state = AdpcmState::default();
    let mut audio_offset = 0usize;
    let mut audio_time = 0.0f64;
    let mut video_time = 0.0f64;

    let mut write_audio_frame = |w: &mut W,
                                  audio: &AudioInput<'_>,
                                  offset: &mut usize,
                                  time: &mut f64,
                                  state: &mut AdpcmState|
     -> Result<()> {
        let remaining = audio.samples.len() - *offset;
        let take = (AUDIO_FRAME_SAMPLES as usize).min(remaining);
        let chunk = &audio.samples[*offset..*offset + take];
        write_audio_chunk(w, *time as u32, chunk, audio.encoding, state)?;
        *offset += take;
        *time += ms_per_audio_frame;
        Ok(())
    };

    for frame in inputs.video_frames {
        if let Some(audio) = &inputs.audio {
            while audio_offset < audio.samples.len()
                && audio_time < video_time + 2.0 * ms_per_video_frame
            {
                write_audio_frame(
                    w,
                    audio,
                    &mut audio_offset,
                    &mut audio_time,
                    &mut audio_state,
                )?;
            }
        }

        write_video_chunk(w, video_time as u32, frame)?;
        video_time += ms_per_video_frame;
    }

    if let Some(audio) = &inputs.audio {
        while audio_offset < audio.samples.len() {
            write_audio_frame(
                w,
                audio,
                &mut audio_offset,
                &mut audio_time,
                &mut audio_state,
            )?;
        }
    }

    format::write_data_end(w)?;
    Ok(())
}

fn write_audio_chunk<W: Write>(
    w: &mut W,
    timestamp_ms: u32,
    samples: &[i16],
    encoding: AudioEncoding,
    state: &mut AdpcmState,
) -> Result<()> {
    byteio::write_tag(w, format::AUDIO_DATA_TAG)?;
    byteio::write_u32(w, timestamp_ms)?;

    match encoding {
        AudioEncoding::None => {
            byteio::write_u32(w, (samples.len() * 2) as u32)?;
            for &s in samples {
                byteio::write_i16(w, s)?;
            }
        }
        AudioEncoding::Adpcm => {
            // Snapshot the predictor state *before* encoding this chunk:
            // each chunk must be independently decodable, so the decoder
            // needs the state as it was going in, not coming out.
            let prefix_state = *state;
            // An odd trailing sample (only possible on the very last
            // frame) can't pack into whole nibble-pairs; drop it rather
            // than failing the whole encode.
            let even_len = samples.len() - (samples.len() % 2);
            let packed = adpcm::encode(&samples[..even_len], state)?;
            byteio::write_u32(w, 4 + packed.len() as u32)?;
            byteio::write_i16(w, prefix_state.valprev)?;
            byteio::write_i8(w, prefix_state.index)?;
            byteio::write_u8(w, 0)?;
            w.write_all(&packed)?;
        }
    }
    Ok(())
}

fn write_video_chunk<W: Write>(w: &mut W, timestamp_ms: u32, jpeg_bytes: &[u8]) -> Result<()> {
    byteio::write_tag(w, format::VIDEO_DATA_TAG)?;
    byteio::write_u32(w, timestamp_ms)?;
    byteio::write_u32(w, jpeg_bytes.len() as u32)?;
    w.write_all(jpeg_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movie::Movie;
    use std::io::Cursor;

    fn fake_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xD9]
    }

    #[test]
    fn encodes_a_video_only_stream_readable_by_the_movie_loader() {
        let frames: Vec<Vec<u8>> = (0..5).map(|_| fake_jpeg()).collect();
        let inputs = EncodeInputs {
            fps: 10.0,
            video_width: 4,
            video_height: 4,
            video_frames: &frames,
            audio: None,
        };

        let mut out = Vec::new();
        encode(&mut out, &inputs).unwrap();

        let movie = Movie::load(Cursor::new(out)).unwrap();
        assert!(movie.video().is_some());
        assert_eq!(movie.video().unwrap().frames, 5);
        assert!(movie.audio().is_none());
    }

    #[test]
    fn encodes_adpcm_audio_with_independent_chunk_state() {
        let samples: Vec<i16> = (0..2048).map(|i| ((i % 100) * 10) as i16).collect();
        let inputs = EncodeInputs {
            fps: 15.0,
            video_width: 0,
            video_height: 0,
            video_frames: &[],
            audio: Some(AudioInput {
                rate: 22050,
                bits: 16,
                encoding: AudioEncoding::Adpcm,
                samples: &samples,
            }),
        };

        let mut out = Vec::new();
        encode(&mut out, &inputs).unwrap();

        let movie = Movie::load(Cursor::new(out)).unwrap();
        let audio = movie.audio().unwrap();
        assert!(audio.is_adpcm());
    }

    #[test]
    fn odd_total_sample_count_truncates_instead_of_failing() {
        let samples: Vec<i16> = (0..2049).map(|i| ((i % 100) * 10) as i16).collect();
        let inputs = EncodeInputs {
            fps: 15.0,
            video_width: 0,
            video_height: 0,
            video_frames: &[],
            audio: Some(AudioInput {
                rate: 22050,
                bits: 16,
                encoding: AudioEncoding::Adpcm,
                samples: &samples,
            }),
        };

        let mut out = Vec::new();
        encode(&mut out, &inputs).unwrap();

        let movie = Movie::load(Cursor::new(out)).unwrap();
        assert!(movie.audio().unwrap().is_adpcm());
    }
}
