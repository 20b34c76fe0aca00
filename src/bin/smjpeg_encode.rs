//! `smjpeg_encode` — multiplexes a directory of JPEG frames and a raw
//! PCM audio file into an SMJPEG movie.

use std::fs;
use std::io::{BufWriter, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use smjpeg::muxer::{encode, AudioEncoding, AudioInput, EncodeInputs};

const DEFAULT_AUDIO_RATE: u16 = 22050;
const DEFAULT_AUDIO_BITS: u8 = 16;
const DEFAULT_JPEG_PREFIX: &str = "input/frame";
const DEFAULT_AUDIO_INPUT: &str = "audio.raw";
const DEFAULT_OUTPUT_FILE: &str = "output.mjpg";

/// Encode a sequence of `input/frame<N>.jpg` files and `audio.raw` into
/// an SMJPEG movie.
#[derive(Parser, Debug)]
#[command(name = "smjpeg_encode", version)]
struct Cli {
    /// Video frame rate.
    #[arg(short = 'r', default_value_t = 15.0)]
    fps: f64,

    /// Audio channel count. Only mono (1) is currently supported.
    #[arg(short = 'c', default_value_t = 1)]
    channels: u8,

    #[arg(long, default_value = DEFAULT_JPEG_PREFIX)]
    jpeg_prefix: PathBuf,

    #[arg(long, default_value = DEFAULT_AUDIO_INPUT)]
    audio_input: PathBuf,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,
}

fn main() -> ExitCode {
    smjpeg::logging::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => {
            println!("Encoding successfully completed.");
            ExitCode::from(0)
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(err.downcast_ref::<EncodeExit>().map(|e| e.0).unwrap_or(1))
        }
    }
}

#[derive(Debug)]
struct EncodeExit(u8);

impl std::fmt::Display for EncodeExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "encode failed with status {}", self.0)
    }
}
impl std::error::Error for EncodeExit {}

fn run(cli: &Cli) -> Result<()> {
    if cli.channels != 1 {
        anyhow::bail!("only mono audio is supported");
    }

    let jpeg_prefix = cli.jpeg_prefix.to_string_lossy().into_owned();
    let mut frame_paths = Vec::new();
    let mut index = 0usize;
    loop {
        let path = PathBuf::from(format!("{jpeg_prefix}{index}.jpg"));
        if !path.is_file() {
            break;
        }
        frame_paths.push(path);
        index += 1;
    }
    if frame_paths.is_empty() {
        eprintln!("Warning: no video stream - audio only");
    }

    let (video_width, video_height) = if let Some(first) = frame_paths.first() {
        jpeg_dimensions(first)?
    } else {
        (0, 0)
    };

    let video_frames = frame_paths
        .iter()
        .map(fs::read)
        .collect::<std::io::Result<Vec<Vec<u8>>>>()
        .context("reading a JPEG frame")?;

    let audio_bytes = fs::read(&cli.audio_input).ok();
    if audio_bytes.is_none() {
        eprintln!("Warning: no audio stream - video only");
    }

    if video_frames.is_empty() && audio_bytes.is_none() {
        eprintln!("No audio or video input - aborting!");
        return Err(EncodeExit(1).into());
    }

    let audio_samples = audio_bytes.as_ref().map(|bytes| bytes_to_samples(bytes));

    let inputs = EncodeInputs {
        fps: cli.fps,
        video_width,
        video_height,
        video_frames: &video_frames,
        audio: audio_samples.as_ref().map(|samples| AudioInput {
            rate: DEFAULT_AUDIO_RATE,
            bits: DEFAULT_AUDIO_BITS,
            encoding: AudioEncoding::Adpcm,
            samples,
        }),
    };

    if !video_frames.is_empty() {
        println!(
            "Encoding {} {}x{} frames of JFIF encoded video at {:.2} FPS",
            video_frames.len(),
            video_width,
            video_height,
            cli.fps
        );
    }
    if inputs.audio.is_some() {
        println!(
            "- Multiplexing {}-bit mono audio stream at {} Hz",
            DEFAULT_AUDIO_BITS, DEFAULT_AUDIO_RATE
        );
    }

    let output_file = fs::File::create(&cli.output).map_err(|_| EncodeExit(2))?;
    let mut writer = BufWriter::new(output_file);
    encode(&mut writer, &inputs).map_err(|_| EncodeExit(6))?;

    Ok(())
}

fn jpeg_dimensions(path: &PathBuf) -> Result<(u16, u16)> {
    let mut file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let mut decoder = jpeg_decoder::Decoder::new(bytes.as_slice());
    decoder
        .read_info()
        .with_context(|| format!("reading JPEG header from {}", path.display()))?;
    let info = decoder
        .info()
        .context("JPEG decoder produced no image info")?;
    Ok((info.width, info.height))
}

fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}
