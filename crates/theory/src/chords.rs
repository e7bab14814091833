use score::Piece;

use crate::templates::{match_chord, FLAT_KEY_ROOTS};
use crate::types::{ChordQuality, KeyDetection, KeyMode, MeasureChord};

/// Scale-degree names by semitone distance from the tonic, major keys.
const MAJOR_DEGREES: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

/// Scale-degree names by semitone distance from the tonic, minor keys
/// (natural minor as the reference scale).
const MINOR_DEGREES: [&str; 12] = [
    "I", "bII", "II", "III", "#III", "IV", "#IV", "V", "VI", "#VI", "VII", "#VII",
];

/// Label each measure of a piece with its best-matching chord.
///
/// Collects the distinct pitch classes of every note in the measure, uses
/// the lowest sounding pitch as a bass hint, and matches against the chord
/// templates. Measures with no notes or no convincing match are skipped.
pub fn label_measures(piece: &Piece, key: &KeyDetection) -> Vec<MeasureChord> {
    let use_flats = FLAT_KEY_ROOTS.contains(&key.root_pitch_class);
    let mut labels = Vec::new();

    for (index, measure) in piece.measures.iter().enumerate() {
        if measure.is_empty() {
            continue;
        }

        let mut pitch_classes: Vec<u8> = Vec::new();
        let mut lowest: Option<u8> = None;
        for note in &measure.notes {
            let pc = note.pitch % 12;
            if !pitch_classes.contains(&pc) {
                pitch_classes.push(pc);
            }
            if lowest.map_or(true, |low| note.pitch < low) {
                lowest = Some(note.pitch);
            }
        }

        let bass_hint = lowest.map(|pitch| pitch % 12);
        let Some(m) = match_chord(&pitch_classes, bass_hint) else {
            continue;
        };

        labels.push(MeasureChord {
            measure: index,
            symbol: m.symbol(use_flats),
            root_pitch_class: m.root_pitch_class,
            quality: m.quality,
            numeral: roman_numeral(m.root_pitch_class, m.quality, key),
            confidence: m.score,
        });
    }

    labels
}

/// Roman numeral for a chord root relative to a key, cased by chord third
/// and suffixed by quality, e.g. "V7", "ii", "viio7".
pub fn roman_numeral(root_pitch_class: u8, quality: ChordQuality, key: &KeyDetection) -> String {
    let degree = ((root_pitch_class + 12 - key.root_pitch_class) % 12) as usize;
    let base = match key.mode {
        KeyMode::Major => MAJOR_DEGREES[degree],
        KeyMode::Minor => MINOR_DEGREES[degree],
    };

    let numeral = if quality.minor_third() {
        base.to_lowercase()
    } else {
        base.to_string()
    };

    let suffix = match quality {
        ChordQuality::Major | ChordQuality::Minor => "",
        ChordQuality::Diminished => "o",
        ChordQuality::Diminished7 => "o7",
        ChordQuality::HalfDiminished7 => "ø7",
        ChordQuality::Augmented => "+",
        ChordQuality::Dominant7 | ChordQuality::Minor7 => "7",
        ChordQuality::Major7 => "maj7",
        ChordQuality::MinorMajor7 => "(maj7)",
        ChordQuality::Major6 | ChordQuality::Minor6 => "6",
        ChordQuality::Add9 => "add9",
        ChordQuality::Suspended4 => "sus4",
        ChordQuality::Suspended2 => "sus2",
        ChordQuality::Power => "5",
    };

    format!("{}{}", numeral, suffix)
}
