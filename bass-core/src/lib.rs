// bass-core/src/lib.rs

//! The analysis core behind the bass practice tools (tuner, looper, BPM
//! detector). This crate is responsible for audio capture, pitch detection,
//! note mapping, chord guessing and tempo estimation. It is completely
//! headless and contains no display code.

pub mod analyzer;
pub mod audio;
pub mod chord;
pub mod config;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod tempo;
pub mod tuning;

pub use analyzer::{AnalysisFrame, Analyzer};
pub use error::AnalysisError;

/// One window of mono audio handed to the analysis loop each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Index of the first sample in the source stream.
    position: u64,
}

impl SampleBuffer {
    /// Wraps a window of samples in [-1, 1].
    ///
    /// Empty windows and a zero sample rate are rejected here so the
    /// analysis functions never have to check for them.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(AnalysisError::EmptyBuffer);
        }
        Ok(Self {
            samples,
            sample_rate,
            position: 0,
        })
    }

    /// Places the window at `position` samples into its stream.
    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Stream time of the first sample in seconds. Windows the host never
    /// analysed still count, so this tracks capture time.
    pub fn timestamp(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Root-mean-square amplitude of a window. Zero for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
