//! # Analysis Configuration
//!
//! Tunable thresholds for every analysis path. The defaults are the values the
//! practice tools ship with; a host may override any subset of them (the CLI
//! reads them from a TOML file).

use serde::{Deserialize, Serialize};

/// Top-level configuration for an [`Analyzer`](crate::analyzer::Analyzer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub pitch: PitchConfig,
    pub chord: ChordConfig,
    pub tempo: TempoConfig,
    pub spectrum: SpectrumConfig,
}

/// Autocorrelation pitch detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Buffers quieter than this RMS are reported as no signal.
    pub rms_gate: f32,
    /// Edge samples louder than this are trimmed before correlating.
    pub trim_threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            rms_gate: 0.01,
            trim_threshold: 0.2,
        }
    }
}

/// Chroma chord classifier settings. Amplitudes are on the 0-255 byte scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig {
    pub noise_floor: u8,
    pub min_frequency: f32,
    pub max_frequency: f32,
    /// Chroma vectors whose strongest bin is below this are ignored.
    pub min_energy: f32,
    /// Fraction of the strongest bin a pitch class needs to count as active.
    pub active_ratio: f32,
    /// Template tones that must be present before a chord is reported.
    pub min_score: u8,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            noise_floor: 50,
            min_frequency: 60.0,
            max_frequency: 2000.0,
            min_energy: 10.0,
            active_ratio: 0.4,
            min_score: 3,
        }
    }
}

/// Energy-peak tempo estimator settings. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub history_window: f64,
    pub min_history: usize,
    pub recompute_interval: f64,
    pub threshold_floor: f32,
    pub threshold_factor: f32,
    pub min_interval: f64,
    pub max_interval: f64,
    /// Relative distance from a cluster mean that still joins the cluster.
    pub cluster_tolerance: f64,
    pub min_cluster_size: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            history_window: 3.0,
            min_history: 10,
            recompute_interval: 0.5,
            threshold_floor: 0.04,
            threshold_factor: 1.15,
            min_interval: 0.25,
            max_interval: 1.5,
            cluster_tolerance: 0.15,
            min_cluster_size: 2,
        }
    }
}

/// Settings for the byte-scale magnitude spectrum fed to the chord classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    /// Weight of the previous spectrum when smoothing across ticks (0.0-1.0).
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}
