//! # Musical Tuning Module
//!
//! Maps detected frequencies onto 12-tone equal temperament with A4 = 440 Hz.
//!
//! ## Features
//! - Frequency to note, octave and cents deviation
//! - Note name to MIDI number and frequency conversions
//! - Standard 4- and 5-string bass tuning targets

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AnalysisError;

/// Reference pitch for A4 (MIDI note 69).
pub const A4_FREQUENCY: f32 = 440.0;
const A4_MIDI: i32 = 69;

/// The twelve pitch classes, indexed from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

const PITCH_CLASSES: [PitchClass; 12] = [
    PitchClass::C,
    PitchClass::CSharp,
    PitchClass::D,
    PitchClass::DSharp,
    PitchClass::E,
    PitchClass::F,
    PitchClass::FSharp,
    PitchClass::G,
    PitchClass::GSharp,
    PitchClass::A,
    PitchClass::ASharp,
    PitchClass::B,
];

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl PitchClass {
    /// Pitch class for any integer, wrapping every 12 semitones.
    pub fn from_index(index: i32) -> Self {
        PITCH_CLASSES[index.rem_euclid(12) as usize]
    }

    /// Index from C = 0 to B = 11.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The nearest equal-tempered note to a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteReading {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Deviation from the note in cents, in (-50, 50]. Positive is sharp.
    pub cents: f32,
}

impl NoteReading {
    /// MIDI number of the note this reading snapped to.
    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class.index() as i32
    }
}

impl fmt::Display for NoteReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {:+.1}c", self.pitch_class, self.octave, self.cents)
    }
}

/// Converts a frequency to a fractional MIDI note number.
pub fn frequency_to_midi(freq: f32) -> f32 {
    A4_MIDI as f32 + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Equal-tempered frequency of a MIDI note number.
pub fn note_frequency(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Finds the nearest equal-tempered note to `freq` and how far off it is.
///
/// A frequency exactly halfway between two notes snaps to the lower one, so
/// the cents value never reaches -50.
///
/// # Returns
/// * `Ok(reading)` - Note, octave and cents deviation
/// * `Err(AnalysisError::InvalidFrequency)` - `freq` is zero, negative or not finite
pub fn map_frequency_to_note(freq: f32) -> Result<NoteReading, AnalysisError> {
    if !freq.is_finite() || freq <= 0.0 {
        return Err(AnalysisError::InvalidFrequency(freq));
    }

    let midi = A4_MIDI as f64 + 12.0 * (freq as f64 / A4_FREQUENCY as f64).log2();
    let rounded = (midi - 0.5).ceil();
    let cents = ((midi - rounded) * 100.0) as f32;
    let rounded = rounded as i32;

    Ok(NoteReading {
        pitch_class: PitchClass::from_index(rounded),
        octave: rounded.div_euclid(12) - 1,
        cents,
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// # Returns
/// * Cent deviation (positive = sharp, negative = flat)
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Note names (sharps and flats, octaves -1 to 9) to MIDI numbers.
static NOTE_MAP: Lazy<BTreeMap<String, i32>> = Lazy::new(|| {
    const FLAT_NAMES: [Option<&str>; 12] = [
        None,
        Some("Db"),
        None,
        Some("Eb"),
        None,
        None,
        Some("Gb"),
        None,
        Some("Ab"),
        None,
        Some("Bb"),
        None,
    ];
    let mut map = BTreeMap::new();
    for midi in 0..128 {
        let class = midi as usize % 12;
        let octave = midi / 12 - 1;
        map.insert(format!("{}{}", NOTE_NAMES[class], octave), midi);
        if let Some(flat) = FLAT_NAMES[class] {
            map.insert(format!("{}{}", flat, octave), midi);
        }
    }
    map
});

/// Gets the MIDI number from a note name such as "E1", "C#3" or "Bb2".
pub fn parse_note_name(name: &str) -> Option<i32> {
    NOTE_MAP.get(name.trim()).copied()
}

/// One open string of a bass guitar in standard tuning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BassString {
    /// Note name (e.g., "E1")
    pub name: &'static str,
    pub midi: i32,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Standard 5-string bass tuning, low B first. A 4-string bass uses the top four.
static BASS_STRINGS: Lazy<Vec<BassString>> = Lazy::new(|| {
    ["B0", "E1", "A1", "D2", "G2"]
        .into_iter()
        .filter_map(|name| {
            let midi = parse_note_name(name)?;
            Some(BassString {
                name,
                midi,
                frequency: note_frequency(midi),
            })
        })
        .collect()
});

/// Open strings for a 4- or 5-string bass, lowest first.
pub fn standard_tuning(string_count: usize) -> &'static [BassString] {
    if string_count >= 5 {
        &BASS_STRINGS[..]
    } else {
        &BASS_STRINGS[1..]
    }
}

/// Finds a string of the standard tuning by note name.
pub fn find_string(name: &str) -> Option<&'static BassString> {
    let midi = parse_note_name(name)?;
    BASS_STRINGS.iter().find(|s| s.midi == midi)
}

/// The open string closest to `freq` in pitch (log distance).
pub fn nearest_string(freq: f32, string_count: usize) -> Option<&'static BassString> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    standard_tuning(string_count).iter().min_by(|a, b| {
        let diff_a = calculate_cents_deviation(freq, a.frequency).abs();
        let diff_b = calculate_cents_deviation(freq, b.frequency).abs();
        diff_a.total_cmp(&diff_b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_a_is_exact() {
        let reading = map_frequency_to_note(440.0).unwrap();
        assert_eq!(
            reading,
            NoteReading {
                pitch_class: PitchClass::A,
                octave: 4,
                cents: 0.0
            }
        );
        let reading = map_frequency_to_note(220.0).unwrap();
        assert_eq!(reading.pitch_class, PitchClass::A);
        assert_eq!(reading.octave, 3);
        assert_eq!(reading.cents, 0.0);
    }

    #[test]
    fn equal_tempered_notes_have_zero_cents() {
        for midi in 23..80 {
            let reading = map_frequency_to_note(note_frequency(midi)).unwrap();
            assert_eq!(reading.midi(), midi);
            assert!(reading.cents.abs() < 0.01, "midi {midi}: {}", reading.cents);
        }
    }

    #[test]
    fn one_percent_sharp_is_about_seventeen_cents() {
        let e1 = note_frequency(28);
        let reading = map_frequency_to_note(e1 * 1.01).unwrap();
        assert_eq!(reading.pitch_class, PitchClass::E);
        assert_eq!(reading.octave, 1);
        assert!(reading.cents > 16.5 && reading.cents < 17.8, "{}", reading.cents);
    }

    #[test]
    fn crossing_the_halfway_point_switches_note() {
        let below = map_frequency_to_note(A4_FREQUENCY * 2.0_f32.powf(0.49 / 12.0)).unwrap();
        assert_eq!(below.pitch_class, PitchClass::A);
        assert!((below.cents - 49.0).abs() < 0.05);

        let above = map_frequency_to_note(A4_FREQUENCY * 2.0_f32.powf(0.51 / 12.0)).unwrap();
        assert_eq!(above.pitch_class, PitchClass::ASharp);
        assert!((above.cents + 49.0).abs() < 0.05);
    }

    #[test]
    fn cents_stay_in_range() {
        let mut freq = 30.0_f32;
        while freq < 2000.0 {
            let cents = map_frequency_to_note(freq).unwrap().cents;
            assert!(cents > -50.0 && cents <= 50.0, "{freq}: {cents}");
            freq *= 1.0137;
        }
    }

    #[test]
    fn low_b_and_octave_boundaries() {
        let b0 = map_frequency_to_note(30.87).unwrap();
        assert_eq!((b0.pitch_class, b0.octave), (PitchClass::B, 0));
        let c1 = map_frequency_to_note(32.70).unwrap();
        assert_eq!((c1.pitch_class, c1.octave), (PitchClass::C, 1));
    }

    #[test]
    fn mapping_is_pure() {
        assert_eq!(map_frequency_to_note(97.3), map_frequency_to_note(97.3));
    }

    #[test]
    fn rejects_degenerate_frequencies() {
        for freq in [0.0, -10.0, f32::NAN, f32::INFINITY] {
            assert!(map_frequency_to_note(freq).is_err());
        }
    }

    #[test]
    fn note_names_round_trip() {
        assert_eq!(parse_note_name("A4"), Some(69));
        assert_eq!(parse_note_name("E1"), Some(28));
        assert_eq!(parse_note_name("Bb2"), parse_note_name("A#2"));
        assert_eq!(parse_note_name("H2"), None);
    }

    #[test]
    fn bass_strings() {
        let four: Vec<_> = standard_tuning(4).iter().map(|s| s.name).collect();
        assert_eq!(four, ["E1", "A1", "D2", "G2"]);
        assert_eq!(standard_tuning(5)[0].name, "B0");
        assert!((find_string("A1").unwrap().frequency - 55.0).abs() < 1e-3);
        assert_eq!(nearest_string(43.0, 4).unwrap().name, "E1");
        assert_eq!(nearest_string(100.0, 4).unwrap().name, "G2");
        assert_eq!(nearest_string(31.0, 5).unwrap().name, "B0");
        assert!(nearest_string(0.0, 4).is_none());
    }

    #[test]
    fn cents_deviation_against_a_target() {
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(54.0, 55.0) < 0.0);
    }
}
