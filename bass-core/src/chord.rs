//! # Chord Guessing Module
//!
//! Folds a byte-scale magnitude spectrum into a 12-bin chroma vector and
//! matches the loudest pitch classes against a handful of triad and seventh
//! chord templates. This is a best-effort label for a practice display, not a
//! harmonic analyser: it reports one plausible chord or nothing.

use serde::Serialize;
use std::fmt;
use std::ops::Index;

use crate::config::ChordConfig;
use crate::tuning::{PitchClass, frequency_to_midi};

/// Chord qualities, in the order templates are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
}

impl ChordQuality {
    /// Short suffix used in chord symbols ("", "m", "7", "maj7", "m7").
    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
        }
    }
}

/// Intervals above the root for each quality. Order matters for tie-breaking.
const CHORD_TEMPLATES: [(ChordQuality, &[usize]); 5] = [
    (ChordQuality::Major, &[0, 4, 7]),
    (ChordQuality::Minor, &[0, 3, 7]),
    (ChordQuality::Dominant7, &[0, 4, 7, 10]),
    (ChordQuality::Major7, &[0, 4, 7, 11]),
    (ChordQuality::Minor7, &[0, 3, 7, 10]),
];

/// A chord label for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChordGuess {
    pub root: PitchClass,
    pub quality: ChordQuality,
    /// Number of template tones found among the active pitch classes.
    pub match_score: u8,
}

impl fmt::Display for ChordGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality.suffix())
    }
}

/// Energy per pitch class, indexed from C = 0 to B = 11.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChromaVector([f32; 12]);

impl ChromaVector {
    pub fn new(bins: [f32; 12]) -> Self {
        Self(bins)
    }

    pub fn bins(&self) -> &[f32; 12] {
        &self.0
    }

    pub fn max_energy(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }

    /// Pitch classes holding at least `ratio` of the strongest bin, ascending.
    pub fn active_classes(&self, ratio: f32) -> Vec<usize> {
        let cutoff = ratio * self.max_energy();
        (0..12).filter(|&i| self.0[i] >= cutoff).collect()
    }
}

impl Index<usize> for ChromaVector {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

/// Builds a chroma vector from a 0-255 magnitude spectrum.
///
/// # Arguments
/// * `spectrum` - One amplitude per bin, bin 0 at DC, last bin just below Nyquist
/// * `sample_rate` - Sample rate the spectrum was computed at
/// * `config` - Noise floor and frequency band
pub fn chroma_from_spectrum(spectrum: &[u8], sample_rate: u32, config: &ChordConfig) -> ChromaVector {
    let mut chroma = [0.0_f32; 12];
    if spectrum.is_empty() {
        return ChromaVector(chroma);
    }
    let bin_width = (sample_rate as f32 / 2.0) / spectrum.len() as f32;

    for (bin, &amplitude) in spectrum.iter().enumerate() {
        if amplitude < config.noise_floor {
            continue;
        }
        let freq = bin as f32 * bin_width;
        if freq < config.min_frequency || freq > config.max_frequency {
            continue;
        }
        let midi = frequency_to_midi(freq);
        let nearest = midi.round();
        let diff = midi - nearest;
        let weight = (-diff * diff).exp();
        chroma[(nearest as i32).rem_euclid(12) as usize] += weight * amplitude as f32;
    }

    ChromaVector(chroma)
}

/// Guesses a chord from a 0-255 magnitude spectrum with the default settings.
pub fn classify(spectrum: &[u8], sample_rate: u32) -> Option<ChordGuess> {
    classify_with(spectrum, sample_rate, &ChordConfig::default())
}

pub fn classify_with(spectrum: &[u8], sample_rate: u32, config: &ChordConfig) -> Option<ChordGuess> {
    classify_chroma(&chroma_from_spectrum(spectrum, sample_rate, config), config)
}

/// Matches a chroma vector against the chord templates.
///
/// Every active pitch class is tried as a root against every template. The
/// first best score wins: roots are tried in ascending pitch-class order and
/// templates in the order of [`ChordQuality`], so a plain triad beats a
/// seventh chord that matches the same three tones.
pub fn classify_chroma(chroma: &ChromaVector, config: &ChordConfig) -> Option<ChordGuess> {
    if chroma.max_energy() < config.min_energy {
        return None;
    }

    let active = chroma.active_classes(config.active_ratio);
    if active.len() < 2 {
        return None;
    }

    let mut best: Option<ChordGuess> = None;
    for &root in &active {
        for &(quality, intervals) in &CHORD_TEMPLATES {
            let score = intervals
                .iter()
                .filter(|&&interval| active.contains(&((root + interval) % 12)))
                .count() as u8;
            if best.is_none_or(|b| score > b.match_score) {
                best = Some(ChordGuess {
                    root: PitchClass::from_index(root as i32),
                    quality,
                    match_score: score,
                });
            }
        }
    }

    best.filter(|guess| guess.match_score >= config.min_score)
}
