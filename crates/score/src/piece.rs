use serde::{Deserialize, Serialize};

use crate::note::{pitch_name, Note};

/// Default pulses per quarter note for pieces not built from a MIDI file.
pub const DEFAULT_PPQ: u16 = 480;

/// Default tempo: 120 BPM.
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Time signature governing the measure grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSig {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSig {
    pub const COMMON: TimeSig = TimeSig {
        numerator: 4,
        denominator: 4,
    };

    /// Measure length in quarter-note beats: numerator × 4 / denominator.
    pub fn beats_per_measure(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }
}

impl std::fmt::Display for TimeSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// One measure: notes ordered by onset beat, part, pitch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub notes: Vec<Note>,
}

impl Measure {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub(crate) fn sort(&mut self) {
        self.notes.sort_by_key(Note::sort_key);
    }
}

/// Aggregate statistics for one source part (hand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartProfile {
    pub part: u8,
    pub note_count: usize,
    pub pitch_min: u8,
    pub pitch_max: u8,
    pub mean_pitch: f64,
}

/// A piece as an ordered sequence of measures on a fixed grid.
///
/// The grid is derived from the input time signature and never moves:
/// edits place notes inside existing measures (or open exactly one new
/// trailing measure) but cannot change measure boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub ppq: u16,
    /// Microseconds per quarter note.
    pub tempo_us: u32,
    pub time_sig: TimeSig,
    pub measures: Vec<Measure>,
}

impl Piece {
    /// An empty piece on the given grid, with default timing metadata.
    pub fn empty(time_sig: TimeSig) -> Self {
        Self {
            ppq: DEFAULT_PPQ,
            tempo_us: DEFAULT_TEMPO_US,
            time_sig,
            measures: Vec::new(),
        }
    }

    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    pub fn note_count(&self) -> usize {
        self.measures.iter().map(|m| m.notes.len()).sum()
    }

    pub fn beats_per_measure(&self) -> f64 {
        self.time_sig.beats_per_measure()
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.tempo_us as f64
    }

    /// Iterate all notes in measure order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.measures.iter().flat_map(|m| m.notes.iter())
    }

    /// Statistics per source part, in part order. Parts with no notes are
    /// omitted.
    pub fn part_profiles(&self) -> Vec<PartProfile> {
        let mut parts: Vec<u8> = self.notes().map(|n| n.part).collect();
        parts.sort_unstable();
        parts.dedup();

        parts
            .into_iter()
            .map(|part| {
                let notes: Vec<&Note> = self.notes().filter(|n| n.part == part).collect();
                let pitch_min = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
                let pitch_max = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
                let mean_pitch = notes.iter().map(|n| n.pitch as f64).sum::<f64>()
                    / notes.len().max(1) as f64;
                PartProfile {
                    part,
                    note_count: notes.len(),
                    pitch_min,
                    pitch_max,
                    mean_pitch,
                }
            })
            .collect()
    }

    /// Index range of the trailing window of at most `n` measures.
    pub fn tail_window(&self, n: usize) -> std::ops::Range<usize> {
        let len = self.measures.len();
        len.saturating_sub(n)..len
    }

    /// Render a measure range as plain text for prompt inclusion.
    ///
    /// One header line per measure, one line per note with pitch name,
    /// MIDI number, onset beat, duration, and velocity.
    pub fn render_measures(&self, range: std::ops::Range<usize>) -> String {
        let mut out = String::new();
        for index in range {
            let Some(measure) = self.measures.get(index) else {
                break;
            };
            out.push_str(&format!("measure {}:\n", index));
            if measure.is_empty() {
                out.push_str("  (empty)\n");
                continue;
            }
            for note in &measure.notes {
                out.push_str(&format!(
                    "  {} (pitch {}) beat {:.2} dur {:.2} vel {}\n",
                    pitch_name(note.pitch),
                    note.pitch,
                    note.beat,
                    note.duration,
                    note.velocity,
                ));
            }
        }
        out
    }
}
