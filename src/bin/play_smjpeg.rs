//! `play_smjpeg` — plays one or more SMJPEG movies. Since real
//! display/audio hardware is out of scope for this crate, frames are
//! decoded into an in-memory surface and
//! audio is drained into a null sink; wire up real
//! `VideoSurface`/`AudioSink` implementations to actually show/hear
//! anything.

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use smjpeg::colorspace::PixelFormat;
use smjpeg::surface::MemorySurface;
use smjpeg::{Movie, Scheduler};

/// Play one or more SMJPEG movies.
#[derive(Parser, Debug)]
#[command(name = "play_smjpeg", version)]
struct Cli {
    /// Double the video output size (nearest-neighbor 2x).
    #[arg(short = '2')]
    double: bool,

    /// Loop each movie until interrupted.
    #[arg(short = 'l')]
    loop_playback: bool,

    files: Vec<String>,
}

fn main() -> ExitCode {
    smjpeg::logging::init();
    let cli = Cli::parse();

    if cli.files.is_empty() {
        eprintln!("Usage: play_smjpeg [-2] [-l] file.mjpg [file.mjpg ...]");
        return ExitCode::from(1);
    }

    for path in &cli.files {
        if let Err(err) = play_one(path, cli.double, cli.loop_playback) {
            eprintln!("{path}: {err:#}");
        }
    }
    ExitCode::from(0)
}

fn play_one(path: &str, double: bool, loop_playback: bool) -> Result<()> {
    let file = File::open(path).with_context(|| format!("couldn't open {path}"))?;
    let movie = Movie::load(BufReader::new(file)).context("loading SMJPEG header")?;

    if let Some(audio) = movie.audio() {
        println!(
            "Audio stream: {} bit {} audio at {} Hz",
            audio.bits,
            if audio.channels == 1 { "mono" } else { "stereo" },
            audio.rate
        );
    }
    if let Some(video) = movie.video() {
        println!(
            "Video stream: {} frames of {}x{} animation",
            video.frames, video.width, video.height
        );
    }

    let mut scheduler = Scheduler::new(movie);
    if let Some(video) = scheduler.movie().video() {
        let (w, h) = (video.width as u32, video.height as u32);
        let surface = MemorySurface::new(PixelFormat::Rgb565, w, h);
        scheduler.set_target(Box::new(surface), double)?;
    }

    let has_audio = scheduler.movie().audio().is_some();

    loop {
        // `Scheduler::stop` waits for the ring to drain, so a consumer
        // has to actually be pulling from it — in a real player that's
        // the audio callback thread; here it's a throwaway drain loop
        // into a null sink.
        let drain_handle = has_audio.then(|| {
            let ring = scheduler.ring();
            let playing = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
            let playing_for_thread = std::sync::Arc::clone(&playing);
            let handle = std::thread::spawn(move || {
                let mut buf = [0u8; 4096];
                while playing_for_thread.load(std::sync::atomic::Ordering::Acquire)
                    || ring.used() > 0
                {
                    if ring.feed(&mut buf) == 0 {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                }
            });
            (handle, playing)
        });

        scheduler.start(true);
        while !scheduler.at_end() {
            scheduler.advance(1, true)?;
        }

        if let Some((handle, playing)) = drain_handle {
            playing.store(false, std::sync::atomic::Ordering::Release);
            handle.join().expect("audio drain thread panicked");
        }
        scheduler.stop();

        if loop_playback {
            scheduler.rewind()?;
        } else {
            break;
        }
    }

    Ok(())
}
