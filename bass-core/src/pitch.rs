//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a single bass note from a
//! time-domain window using plain autocorrelation.
//!
//! ## Features
//! - RMS noise gate to filter out silence
//! - Edge trimming to stabilise the correlation peak
//! - Parabolic interpolation for sub-sample accuracy

use crate::config::PitchConfig;
use crate::rms;

/// Detects the fundamental frequency of `signal` with the default settings.
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No signal (silence, or no usable correlation peak)
pub fn detect_fundamental(signal: &[f32], sample_rate: u32) -> Option<f32> {
    detect_fundamental_with(signal, sample_rate, &PitchConfig::default())
}

/// Autocorrelation pitch detector.
///
/// # Arguments
/// * `signal` - Input audio window, samples in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Noise gate and trim thresholds
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No signal (silence, or no usable correlation peak)
pub fn detect_fundamental_with(
    signal: &[f32],
    sample_rate: u32,
    config: &PitchConfig,
) -> Option<f32> {
    // --- Noise Gate ---
    if rms(signal) < config.rms_gate {
        return None;
    }

    // --- Trim the loud edges ---
    let trimmed = trim_edges(signal, config.trim_threshold);
    let size = trimmed.len();
    if size < 3 {
        return None;
    }

    let correlation = autocorrelate(trimmed);

    // --- Walk down the zero-lag peak to the first trough ---
    let mut trough = 0;
    while trough + 1 < size && correlation[trough] > correlation[trough + 1] {
        trough += 1;
    }
    if trough + 1 >= size {
        return None;
    }

    // --- Strongest peak after the trough (first one wins on ties) ---
    let mut peak = trough;
    for lag in trough..size {
        if correlation[lag] > correlation[peak] {
            peak = lag;
        }
    }

    // Interpolation needs both neighbours.
    let peak = peak.clamp(1, size - 2);
    let period = peak as f32 + parabolic_offset(
        correlation[peak - 1],
        correlation[peak],
        correlation[peak + 1],
    );

    let frequency = sample_rate as f32 / period;
    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Drops the samples before the first quiet sample at the start of the window
/// and after the last quiet sample at the end. Each scan covers half the window.
fn trim_edges(signal: &[f32], threshold: f32) -> &[f32] {
    let size = signal.len();
    if size < 2 {
        return signal;
    }
    let half = size / 2;

    let start = (0..half)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(0);
    let end = (1..half)
        .map(|i| size - i)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(size - 1);

    if start >= end {
        return &[];
    }
    &signal[start..end]
}

/// Unnormalized autocorrelation for every lag in `[0, len)`.
fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let size = signal.len();
    (0..size)
        .map(|lag| {
            signal[..size - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Offset of the vertex of the parabola through three equally spaced points,
/// relative to the middle one.
fn parabolic_offset(y1: f32, y2: f32, y3: f32) -> f32 {
    let a = (y1 + y3 - 2.0 * y2) / 2.0;
    let b = (y3 - y1) / 2.0;
    if a != 0.0 { -b / (2.0 * a) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn detects_bass_and_mid_range_sines() {
        for &freq in &[55.0_f32, 110.0, 220.0, 440.0] {
            let detected = detect_fundamental(&sine(freq, 0.5, 4096), SAMPLE_RATE)
                .unwrap_or_else(|| panic!("no pitch for {freq} Hz"));
            let error = (detected - freq).abs() / freq;
            assert!(error < 0.01, "{freq} Hz detected as {detected} Hz");
        }
    }

    #[test]
    fn upper_strings_at_analyser_window_size() {
        // G2 and D3 fit enough periods in a 2048-sample window.
        for &freq in &[98.0_f32, 146.83] {
            let detected = detect_fundamental(&sine(freq, 0.8, 2048), SAMPLE_RATE).unwrap();
            assert!((detected - freq).abs() / freq < 0.01, "{freq} -> {detected}");
        }
    }

    #[test]
    fn silence_has_no_signal() {
        assert_eq!(detect_fundamental(&vec![0.0; 2048], SAMPLE_RATE), None);
        assert_eq!(detect_fundamental(&sine(220.0, 0.005, 2048), SAMPLE_RATE), None);
    }

    #[test]
    fn tiny_buffers_have_no_signal() {
        assert_eq!(detect_fundamental(&[0.5, -0.5], SAMPLE_RATE), None);
        assert_eq!(detect_fundamental(&[0.9; 4], SAMPLE_RATE), None);
    }

    #[test]
    fn monotonic_correlation_has_no_signal() {
        // A DC offset correlates best at lag zero and never turns upward.
        assert_eq!(detect_fundamental(&vec![0.1; 512], SAMPLE_RATE), None);
    }

    #[test]
    fn peak_at_the_last_lag_is_interpolated_one_lag_in() {
        // Correlation: 0.0525, 0.005, -0.01, -0.005, 0.015. The strongest lag
        // is the last one, so the parabola is fitted around lag 3.
        let signal = [0.1, -0.1, 0.0, 0.1, 0.15, 0.0];
        let detected = detect_fundamental(&signal, 8000).unwrap();
        let expected = 8000.0 / (3.0 - 5.0 / 6.0);
        assert!((detected - expected).abs() < 1.0, "got {detected}");
    }

    #[test]
    fn trimming_keeps_quiet_edges() {
        let signal = [0.9, 0.8, 0.1, 0.5, 0.5, 0.05, 0.9, 0.9];
        assert_eq!(trim_edges(&signal, 0.2), &signal[2..5]);
    }

    #[test]
    fn parabolic_offset_finds_vertex() {
        // y = -(x - 0.25)^2 sampled at -1, 0, 1
        let f = |x: f32| -(x - 0.25) * (x - 0.25);
        let offset = parabolic_offset(f(-1.0), f(0.0), f(1.0));
        assert!((offset - 0.25).abs() < 1e-6);
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }
}
