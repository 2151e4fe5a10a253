//! # Analysis Loop
//!
//! Runs every analysis path over one window per tick: pitch, note, chord and
//! tempo. The [`Analyzer`] owns all cross-tick state (spectrum smoothing and
//! tempo history), so a host creates one per stream and calls
//! [`Analyzer::analyze`] from its polling loop.

use serde::Serialize;

use crate::chord::{self, ChordGuess};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::fft::SpectrumAnalyser;
use crate::pitch;
use crate::tempo::TempoEstimator;
use crate::tuning::{self, NoteReading};
use crate::SampleBuffer;

/// Represents the result of a single audio analysis tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFrame {
    /// The detected fundamental in Hz, `None` when there is no signal.
    pub frequency: Option<f32>,
    /// The nearest note and its cents deviation.
    pub note: Option<NoteReading>,
    /// The best chord label for the current spectrum.
    pub chord: Option<ChordGuess>,
    /// The last confidently detected tempo, 0 until the first estimate.
    pub bpm: u32,
}

/// Per-stream analysis state.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    sample_rate: u32,
    spectrum: SpectrumAnalyser,
    tempo: TempoEstimator,
    bpm: u32,
}

impl Analyzer {
    /// Creates an analyzer for a stream at `sample_rate`.
    ///
    /// # Returns
    /// * `Err(AnalysisError::InvalidSampleRate)` - `sample_rate` is zero
    /// * `Err(AnalysisError::InvalidFftSize)` - the spectrum size is unusable
    pub fn new(sample_rate: u32, config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        let spectrum = SpectrumAnalyser::new(config.spectrum.clone())?;
        let tempo = TempoEstimator::with_config(sample_rate, config.tempo.clone());
        Ok(Self {
            config,
            sample_rate,
            spectrum,
            tempo,
            bpm: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyses one window of a continuous, non-overlapping stream.
    pub fn analyze(&mut self, buffer: &SampleBuffer) -> AnalysisFrame {
        let reported = self.tempo.process(buffer.samples());
        self.finish_tick(buffer, reported)
    }

    /// Analyses a window captured at `timestamp` seconds. Live hosts pass
    /// [`SampleBuffer::timestamp`] so windows dropped upstream keep their
    /// place on the tempo clock; polling hosts pass their own clock.
    pub fn analyze_at(&mut self, buffer: &SampleBuffer, timestamp: f64) -> AnalysisFrame {
        let reported = self.tempo.process_at(buffer.samples(), timestamp);
        self.finish_tick(buffer, reported)
    }

    /// Forgets tempo history and spectrum smoothing, e.g. after seeking.
    pub fn reset(&mut self) {
        self.tempo.reset();
        self.spectrum.reset();
        self.bpm = 0;
    }

    fn finish_tick(&mut self, buffer: &SampleBuffer, reported_bpm: u32) -> AnalysisFrame {
        if buffer.sample_rate() != self.sample_rate {
            log::warn!(
                "Window at {} Hz fed to a {} Hz analyzer, tempo timing will be off",
                buffer.sample_rate(),
                self.sample_rate
            );
        }

        // A zero report means "nothing new this tick"; keep showing the last tempo.
        if reported_bpm > 0 {
            self.bpm = reported_bpm;
        }

        let frequency =
            pitch::detect_fundamental_with(buffer.samples(), buffer.sample_rate(), &self.config.pitch);
        let note = frequency.and_then(|freq| tuning::map_frequency_to_note(freq).ok());

        let spectrum = self.spectrum.byte_spectrum(buffer.samples());
        let chord = chord::classify_with(&spectrum, buffer.sample_rate(), &self.config.chord);

        AnalysisFrame {
            frequency,
            note,
            chord,
            bpm: self.bpm,
        }
    }
}
