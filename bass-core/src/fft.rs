//! # Fast Fourier Transform (FFT) Module
//!
//! Turns a time-domain window into the byte-scale magnitude spectrum the chord
//! classifier reads, the same shape of data a browser analyser node reports.
//!
//! ## Features
//! - RustFFT forward transform, planned once per analyser
//! - DC offset removal and Hann windowing
//! - Exponential smoothing across ticks
//! - Decibel mapping onto 0-255

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::config::SpectrumConfig;
use crate::error::AnalysisError;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Hann window coefficients for a frame of `n` samples.
fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// A stateful spectrum analyser owned by the analysis loop.
///
/// Holds the FFT plan, the window and the previous magnitudes used for
/// smoothing. One analyser serves one stream.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    config: SpectrumConfig,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("config", &self.config)
            .finish()
    }
}

impl SpectrumAnalyser {
    /// Plans an FFT of `config.fft_size` points.
    ///
    /// # Returns
    /// * `Err(AnalysisError::InvalidFftSize)` - size is zero or odd
    pub fn new(config: SpectrumConfig) -> Result<Self, AnalysisError> {
        let fft_size = config.fft_size;
        if fft_size == 0 || fft_size % 2 != 0 {
            return Err(AnalysisError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            window: hann_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            config,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins, half the FFT size.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Computes smoothed linear magnitudes (`|X| / N`) for the latest window.
    ///
    /// Only the most recent `fft_size` samples are used; shorter input is
    /// zero-padded at the end.
    pub fn magnitudes(&mut self, signal: &[f32]) -> &[f32] {
        let start = signal.len().saturating_sub(self.fft_size);
        let mut frame = vec![0.0_f32; self.fft_size];
        let recent = &signal[start..];
        frame[..recent.len()].copy_from_slice(recent);

        remove_dc_offset(&mut frame[..recent.len()]);

        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| Complex {
                re: sample * w,
                im: 0.0,
            })
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let smoothing = self.config.smoothing.clamp(0.0, 1.0);
        for (previous, bin) in self.smoothed.iter_mut().zip(&buffer) {
            let magnitude = bin.norm() * scale;
            *previous = smoothing * *previous + (1.0 - smoothing) * magnitude;
        }
        &self.smoothed
    }

    /// Computes the 0-255 spectrum for the latest window.
    ///
    /// Magnitudes are converted to decibels and the configured decibel range is
    /// mapped linearly onto 0-255, clamping at both ends.
    pub fn byte_spectrum(&mut self, signal: &[f32]) -> Vec<u8> {
        let min_db = self.config.min_decibels;
        let range = (self.config.max_decibels - min_db).max(f32::EPSILON);
        self.magnitudes(signal)
            .iter()
            .map(|&magnitude| {
                let db = 20.0 * magnitude.max(1e-12).log10();
                let scaled = 255.0 * (db - min_db) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Clears the smoothing state.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }
}
