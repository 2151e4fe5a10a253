//! Errors raised at the boundaries of the analysis core.
//!
//! Silence and noise are never errors: the analysis functions report them as
//! `None` (or a held tempo value). These variants only cover input that the
//! capture layer should never hand over in the first place.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("sample buffer is empty")]
    EmptyBuffer,
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),
    #[error("frequency must be positive and finite, got {0}")]
    InvalidFrequency(f32),
    #[error("FFT size must be a non-zero even number, got {0}")]
    InvalidFftSize(usize),
}
