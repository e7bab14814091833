use serde::{Deserialize, Serialize};

use score::{PartProfile, Piece, TimeSig};

use crate::chords::label_measures;
use crate::key::detect_key;
use crate::types::{KeyDetection, MeasureChord};

/// Piece-level analysis bundle: key, meter, chords, and part layout.
///
/// Computed once per run from the input excerpt and embedded in every
/// downstream prompt via [`PieceSummary::render`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceSummary {
    pub key: KeyDetection,
    pub time_sig: TimeSig,
    pub bpm: f64,
    pub measure_count: usize,
    pub note_count: usize,
    pub chords: Vec<MeasureChord>,
    pub parts: Vec<PartProfile>,
}

impl PieceSummary {
    pub fn analyze(piece: &Piece) -> Self {
        let key = detect_key(piece);
        let chords = label_measures(piece, &key);
        Self {
            key,
            time_sig: piece.time_sig,
            bpm: piece.bpm(),
            measure_count: piece.measure_count(),
            note_count: piece.note_count(),
            chords,
            parts: piece.part_profiles(),
        }
    }

    /// Roman-numeral progression in measure order, consecutive repeats
    /// collapsed.
    pub fn progression(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for chord in &self.chords {
            if out.last() != Some(&chord.numeral.as_str()) {
                out.push(&chord.numeral);
            }
        }
        out
    }

    /// Markdown block describing the piece, for prompt inclusion.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "**Key:** {} (confidence {:.2})",
                self.key.label(),
                self.key.confidence
            ),
            format!(
                "**Time signature:** {} at {:.0} BPM",
                self.time_sig, self.bpm
            ),
            format!(
                "**Length:** {} measures, {} notes",
                self.measure_count, self.note_count
            ),
        ];

        let progression = self.progression();
        if progression.is_empty() {
            lines.push("**Progression:** (none detected)".to_string());
        } else {
            lines.push(format!("**Progression:** {}", progression.join(" - ")));
        }

        for part in &self.parts {
            lines.push(format!(
                "**Part {}:** {} notes in {}..{}",
                part.part,
                part.note_count,
                score::pitch_name(part.pitch_min),
                score::pitch_name(part.pitch_max),
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use score::{Measure, Note};

    fn chord_measure(pitches: &[u8], part: u8) -> Measure {
        Measure {
            notes: pitches
                .iter()
                .map(|&pitch| Note {
                    pitch,
                    velocity: 80,
                    beat: 0.0,
                    duration: 4.0,
                    part,
                })
                .collect(),
        }
    }

    fn test_piece() -> Piece {
        let mut piece = Piece::empty(TimeSig::COMMON);
        piece.measures.push(chord_measure(&[48, 60, 64, 67], 0)); // C
        piece.measures.push(chord_measure(&[48, 60, 64, 67], 0)); // C again
        piece.measures.push(chord_measure(&[55, 67, 71, 74], 0)); // G
        piece
    }

    #[test]
    fn progression_collapses_repeats() {
        let summary = PieceSummary::analyze(&test_piece());
        assert_eq!(summary.progression(), vec!["I", "V"]);
    }

    #[test]
    fn render_lists_key_meter_and_parts() {
        let summary = PieceSummary::analyze(&test_piece());
        let text = summary.render();
        assert!(text.contains("**Key:** C major"));
        assert!(text.contains("**Time signature:** 4/4 at 120 BPM"));
        assert!(text.contains("**Length:** 3 measures, 12 notes"));
        assert!(text.contains("**Progression:** I - V"));
        assert!(text.contains("**Part 0:** 12 notes in C3..D5"));
    }

    #[test]
    fn render_without_chords_says_none() {
        let mut piece = Piece::empty(TimeSig::COMMON);
        piece.measures.push(chord_measure(&[60], 0));
        let summary = PieceSummary::analyze(&piece);
        assert!(summary.render().contains("**Progression:** (none detected)"));
    }
}
