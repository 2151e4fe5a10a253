//! Terminal readout for analysis frames: one line per tick, as text or JSON.

use bass_core::AnalysisFrame;
use bass_core::tuning::{self, BassString};
use serde::Serialize;

/// Number of readings the cents needle is averaged over.
const SMOOTHING_FACTOR: usize = 5;

/// What the cents value is measured against.
#[derive(Debug, Clone, PartialEq)]
pub enum TuningMode {
    /// Nearest equal-tempered note
    Auto,
    /// A fixed open string
    String(&'static BassString),
}

/// The values shown for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readout {
    pub frequency: Option<f32>,
    pub note: Option<String>,
    /// Smoothed cents against the note or the selected string
    pub cents: Option<f32>,
    /// Nearest open string, or the selected one
    pub string: Option<&'static str>,
    pub chord: Option<String>,
    pub bpm: u32,
}

#[derive(Debug)]
pub struct Display {
    mode: TuningMode,
    string_count: usize,
    smoothing_buffer: Vec<f32>,
}

impl Display {
    pub fn new(mode: TuningMode, string_count: usize) -> Self {
        Self {
            mode,
            string_count,
            smoothing_buffer: Vec::with_capacity(SMOOTHING_FACTOR),
        }
    }

    pub fn readout(&mut self, frame: &AnalysisFrame) -> Readout {
        let raw_cents = match self.mode {
            TuningMode::Auto => frame.note.map(|note| note.cents),
            TuningMode::String(target) => frame
                .frequency
                .map(|freq| tuning::calculate_cents_deviation(freq, target.frequency)),
        };

        // Smoothing restarts whenever the signal drops out.
        let cents = match raw_cents {
            Some(cents) => {
                self.smoothing_buffer.push(cents);
                if self.smoothing_buffer.len() > SMOOTHING_FACTOR {
                    self.smoothing_buffer.remove(0);
                }
                Some(self.smoothing_buffer.iter().sum::<f32>() / self.smoothing_buffer.len() as f32)
            }
            None => {
                self.smoothing_buffer.clear();
                None
            }
        };

        let string = match self.mode {
            TuningMode::Auto => frame
                .frequency
                .and_then(|freq| tuning::nearest_string(freq, self.string_count))
                .map(|s| s.name),
            TuningMode::String(target) => Some(target.name),
        };

        Readout {
            frequency: frame.frequency,
            note: frame
                .note
                .map(|note| format!("{}{}", note.pitch_class, note.octave)),
            cents,
            string,
            chord: frame.chord.map(|chord| chord.to_string()),
            bpm: frame.bpm,
        }
    }
}

impl Readout {
    pub fn to_text(&self) -> String {
        let pitch = match (self.frequency, &self.note, self.cents) {
            (Some(freq), Some(note), Some(cents)) => {
                format!("{:>4} {:+6.1}c {:7.2} Hz {}", note, cents, freq, meter(cents))
            }
            _ => format!("{:>4} {:>7} {:>10} {}", "--", "", "", meter_idle()),
        };
        let string = self.string.unwrap_or("--");
        let chord = self.chord.as_deref().unwrap_or("--");
        let bpm = if self.bpm > 0 {
            format!("{:3} BPM", self.bpm)
        } else {
            "--- BPM".to_string()
        };
        format!("{}  string {:<3} chord {:<6} {}", pitch, string, chord, bpm)
    }
}

const METER_HALF_WIDTH: usize = 10;

/// A text cent meter from -50 to +50: `[----|----]` with the needle marked.
fn meter(cents: f32) -> String {
    let position = ((cents.clamp(-50.0, 50.0) / 50.0) * METER_HALF_WIDTH as f32).round() as i32
        + METER_HALF_WIDTH as i32;
    let needle = if cents.abs() < 3.0 { '*' } else { '^' };
    let body: String = (0..=2 * METER_HALF_WIDTH as i32)
        .map(|i| {
            if i == position {
                needle
            } else if i == METER_HALF_WIDTH as i32 {
                '|'
            } else {
                '-'
            }
        })
        .collect();
    format!("[{}]", body)
}

fn meter_idle() -> String {
    format!("[{}]", " ".repeat(2 * METER_HALF_WIDTH + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bass_core::chord::{ChordGuess, ChordQuality};
    use bass_core::tuning::{PitchClass, find_string, map_frequency_to_note};

    fn frame(freq: Option<f32>) -> AnalysisFrame {
        AnalysisFrame {
            frequency: freq,
            note: freq.and_then(|f| map_frequency_to_note(f).ok()),
            chord: None,
            bpm: 0,
        }
    }

    #[test]
    fn auto_mode_names_note_and_string() {
        let mut display = Display::new(TuningMode::Auto, 4);
        let readout = display.readout(&frame(Some(55.0)));
        assert_eq!(readout.note.as_deref(), Some("A1"));
        assert_eq!(readout.string, Some("A1"));
        assert!(readout.cents.unwrap().abs() < 0.01);
    }

    #[test]
    fn string_mode_measures_against_the_string() {
        let e1 = find_string("E1").unwrap();
        let mut display = Display::new(TuningMode::String(e1), 4);
        // A full semitone sharp of E1 reads +100 cents, not F1 in tune.
        let readout = display.readout(&frame(Some(e1.frequency * 2.0_f32.powf(1.0 / 12.0))));
        assert!((readout.cents.unwrap() - 100.0).abs() < 0.1);
        assert_eq!(readout.note.as_deref(), Some("F1"));
        assert_eq!(readout.string, Some("E1"));
    }

    #[test]
    fn cents_are_smoothed_and_reset_on_dropout() {
        let mut display = Display::new(TuningMode::Auto, 4);
        let sharp = 440.0 * 2.0_f32.powf(10.0 / 1200.0);
        display.readout(&frame(Some(440.0)));
        let readout = display.readout(&frame(Some(sharp)));
        assert!((readout.cents.unwrap() - 5.0).abs() < 0.01);

        assert_eq!(display.readout(&frame(None)).cents, None);
        let readout = display.readout(&frame(Some(sharp)));
        assert!((readout.cents.unwrap() - 10.0).abs() < 0.01);
    }

    #[test]
    fn text_line_shows_chord_and_tempo() {
        let mut display = Display::new(TuningMode::Auto, 4);
        let mut f = frame(Some(110.0));
        f.chord = Some(ChordGuess {
            root: PitchClass::A,
            quality: ChordQuality::Minor,
            match_score: 3,
        });
        f.bpm = 96;
        let text = display.readout(&f).to_text();
        assert!(text.contains("A2"));
        assert!(text.contains("chord Am"));
        assert!(text.contains(" 96 BPM"));

        let idle = display.readout(&frame(None)).to_text();
        assert!(idle.contains("--- BPM"));
    }

    #[test]
    fn meter_marks_the_needle() {
        assert_eq!(meter(0.0), format!("[{}*{}]", "-".repeat(10), "-".repeat(10)));
        assert!(meter(50.0).ends_with("^]"));
        assert!(meter(-80.0).starts_with("[^"));
        assert_eq!(meter(12.0).chars().count(), 23);
    }
}
