//! SMJPEG motion-JPEG container: multiplex, demultiplex, and play back
//! the format Loki Entertainment's animation player used.
//!
//! A movie is a small header block (overall length plus an optional
//! mono ADPCM/PCM audio track and an optional JFIF video track)
//! followed by interleaved, individually timestamped data chunks. This
//! crate covers loading ([`movie::Movie`]), writing ([`muxer::encode`]),
//! and timed playback ([`scheduler::Scheduler`]) of that format.

pub mod adpcm;
pub mod byteio;
pub mod colorspace;
pub mod error;
pub mod format;
pub mod jpeg_source;
pub mod logging;
pub mod movie;
pub mod muxer;
pub mod ring;
pub mod scheduler;
pub mod surface;

pub use error::{Error, Result, Status};
pub use movie::Movie;
pub use scheduler::{PlaybackOpts, Scheduler};
