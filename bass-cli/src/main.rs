//! # bass - practice readout
//!
//! Drives the analysis core from the default input device or an audio file
//! and prints a readout per tick.
//!
//! ## Architecture
//! - **Capture**: cpal callback thread (live) or a playback thread (file)
//! - **Analysis loop**: main thread, one `Analyzer` call per window
//! - **Communication**: crossbeam channel of mono windows

mod cli;
mod config;
mod decode;
mod display;

use anyhow::{Context, Result, bail};
use bass_core::{Analyzer, SampleBuffer, audio, tuning};
use clap::Parser;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, select};
use std::io::Write;
use std::time::Duration;

use cli::Cli;
use display::{Display, TuningMode};

/// Windows queued between capture and analysis before capture starts dropping.
const CHANNEL_CAPACITY: usize = 16;

/// Where the windows come from. Live capture keeps the stream alive here.
enum Source {
    Live(cpal::Stream),
    File(std::thread::JoinHandle<()>),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if cli.buffer_size < 64 {
        bail!("Buffer size must be at least 64 samples, got {}", cli.buffer_size);
    }

    let analysis_config = config::load_config(cli.config.as_deref());

    let mode = match &cli.string {
        Some(name) => {
            let string = tuning::find_string(name)
                .with_context(|| format!("Unknown bass string: {}", name))?;
            log::info!("Tuning against {} ({:.2} Hz)", string.name, string.frequency);
            TuningMode::String(string)
        }
        None => TuningMode::Auto,
    };

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<SampleBuffer>(CHANNEL_CAPACITY);

    let (source, sample_rate) = match &cli.file {
        Some(path) => {
            let audio = decode::decode_audio(path)?;
            let sample_rate = audio.sample_rate;
            let handle = decode::spawn_file_source(audio, cli.buffer_size, frame_tx, !cli.fast);
            (Source::File(handle), sample_rate)
        }
        None => {
            let (stream, sample_rate) = audio::start_audio_capture(frame_tx, cli.buffer_size)
                .context("Failed to start audio capture")?;
            log::info!("Audio capture started");
            (Source::Live(stream), sample_rate)
        }
    };

    let mut analyzer = Analyzer::new(sample_rate, analysis_config)?;
    let mut display = Display::new(mode, cli.strings);

    let ticks = run_analysis_loop(&frame_rx, &mut analyzer, &mut display, cli.json, cli.duration)?;
    log::info!("Analysed {} windows", ticks);

    // Hang up so a paced file source stops at its next send.
    drop(frame_rx);
    match source {
        Source::Live(stream) => {
            if let Err(e) = stream.pause() {
                log::warn!("Error pausing stream: {}", e);
            }
        }
        Source::File(handle) => {
            if handle.join().is_err() {
                log::warn!("File playback thread panicked");
            }
        }
    }
    Ok(())
}

/// Analyses windows until the source hangs up or the duration elapses.
fn run_analysis_loop(
    frames: &Receiver<SampleBuffer>,
    analyzer: &mut Analyzer,
    display: &mut Display,
    json: bool,
    duration: Option<f64>,
) -> Result<usize> {
    let deadline = match duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            crossbeam_channel::after(Duration::from_secs_f64(secs))
        }
        _ => crossbeam_channel::never(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ticks = 0;

    loop {
        select! {
            recv(frames) -> msg => match msg {
                Ok(buffer) => {
                    let frame = analyzer.analyze_at(&buffer, buffer.timestamp());
                    let readout = display.readout(&frame);
                    if json {
                        serde_json::to_writer(&mut out, &readout)?;
                        writeln!(out)?;
                    } else {
                        writeln!(out, "{}", readout.to_text())?;
                    }
                    ticks += 1;
                }
                Err(_) => {
                    log::info!("Audio source closed");
                    break;
                }
            },
            recv(deadline) -> _ => {
                log::info!("Duration elapsed");
                break;
            },
        }
    }
    out.flush()?;
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bass_core::config::AnalyzerConfig;

    #[test]
    fn loop_stops_when_the_source_hangs_up() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for _ in 0..3 {
            tx.send(SampleBuffer::new(vec![0.0; 512], 8000).unwrap()).unwrap();
        }
        drop(tx);

        let mut analyzer = Analyzer::new(8000, AnalyzerConfig::default()).unwrap();
        let mut display = Display::new(TuningMode::Auto, 4);
        let ticks = run_analysis_loop(&rx, &mut analyzer, &mut display, true, None).unwrap();
        assert_eq!(ticks, 3);
    }

    #[test]
    fn loop_stops_at_the_deadline() {
        let (_tx, rx) = crossbeam_channel::unbounded::<SampleBuffer>();
        let mut analyzer = Analyzer::new(8000, AnalyzerConfig::default()).unwrap();
        let mut display = Display::new(TuningMode::Auto, 4);
        let ticks = run_analysis_loop(&rx, &mut analyzer, &mut display, false, Some(0.05)).unwrap();
        assert_eq!(ticks, 0);
    }
}
