//! # Audio Capture Module
//!
//! Real-time capture from the default input device using CPAL. The callback
//! downmixes to mono, cuts the stream into fixed-size windows and hands each
//! window to the analysis loop over a channel.
//!
//! The stream handle is returned to the caller, which owns the device
//! lifecycle: dropping (or pausing) the stream stops capture.

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Sender, TrySendError};

use crate::SampleBuffer;

/// Default number of samples per analysis window (~46ms at 44.1kHz).
pub const BUFFER_SIZE: usize = 2048;

/// Preferred capture rate. The closest rate the device supports is used.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Collects interleaved callback data into mono windows of a fixed size.
///
/// Every window carries its position in the capture stream, so a window
/// dropped on a full channel still advances the clock the analysis loop sees.
#[derive(Debug)]
pub struct FrameAccumulator {
    channels: usize,
    frame_size: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    /// Stream position of the next window.
    position: u64,
    dropped: u64,
}

impl FrameAccumulator {
    pub fn new(channels: u16, frame_size: usize, sample_rate: u32) -> Self {
        Self {
            channels: channels.max(1) as usize,
            frame_size: frame_size.max(1),
            sample_rate,
            pending: Vec::with_capacity(frame_size * 2),
            position: 0,
            dropped: 0,
        }
    }

    /// Windows discarded because the analysis loop was behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Appends interleaved samples and returns every window completed by them.
    pub fn push_interleaved(&mut self, data: &[f32]) -> Vec<SampleBuffer> {
        if self.channels == 1 {
            self.pending.extend_from_slice(data);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.pending.extend(
                data.chunks_exact(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_size {
            let window: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            let position = self.position;
            self.position += self.frame_size as u64;
            if let Ok(buffer) = SampleBuffer::new(window, self.sample_rate) {
                frames.push(buffer.with_position(position));
            }
        }
        frames
    }

    /// Pushes callback data and forwards completed windows without blocking.
    /// A window that finds the channel full is dropped and counted.
    pub fn dispatch(&mut self, data: &[f32], sender: &Sender<SampleBuffer>) {
        for frame in self.push_interleaved(data) {
            match sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    self.dropped += 1;
                    log::debug!(
                        "Analysis loop behind, dropped window at {:.3}s ({} dropped so far)",
                        frame.timestamp(),
                        self.dropped
                    );
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }
}

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel for the mono windows
/// * `frame_size` - Samples per window
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate
/// * `Err(e)` - No device, no f32 input format, or the stream failed to start
pub fn start_audio_capture(
    sender: Sender<SampleBuffer>,
    frame_size: usize,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device
        .supported_input_configs()
        .context("Failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    let config: cpal::StreamConfig = config.into();

    log::info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

    let err_fn = |err| log::warn!("An error occurred on the audio stream: {}", err);
    let mut accumulator = FrameAccumulator::new(channels, frame_size, sample_rate);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            accumulator.dispatch(data, &sender);
        },
        err_fn,
        None,
    )?;

    stream.play().context("Failed to start the input stream")?;

    Ok((stream, sample_rate))
}

/// Picks the f32 input configuration whose rate range is closest to the
/// target, preferring fewer channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (distance, c.channels())
        })
}
