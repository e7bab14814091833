use serde::{Deserialize, Serialize};

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A single note positioned inside a measure.
///
/// `beat` is the onset offset from the start of the owning measure and
/// `duration` the sounding length, both in quarter-note units. `part`
/// records which source part the note came from (0 or 1 on input; notes
/// written by edit commands are always part 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub beat: f64,
    pub duration: f64,
    #[serde(default)]
    pub part: u8,
}

impl Note {
    /// End of the note relative to the start of its measure, in beats.
    /// May extend past the barline; the note still belongs to the measure
    /// containing its onset.
    pub fn end_beat(&self) -> f64 {
        self.beat + self.duration
    }

    /// Ordering key within a measure: onset first, then part, then pitch.
    pub(crate) fn sort_key(&self) -> (u64, u8, u8) {
        // Beats are non-negative; the bit pattern of a non-negative f64
        // orders the same as the value.
        (self.beat.to_bits(), self.part, self.pitch)
    }
}

/// Scientific pitch name for a MIDI note number, e.g. 60 -> "C4".
pub fn pitch_name(pitch: u8) -> String {
    let name = NOTE_NAMES_SHARP[(pitch % 12) as usize];
    let octave = (pitch / 12) as i8 - 1;
    format!("{}{}", name, octave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(21), "A0");
        assert_eq!(pitch_name(108), "C8");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn end_beat_spans_duration() {
        let note = Note {
            pitch: 60,
            velocity: 80,
            beat: 1.5,
            duration: 0.5,
            part: 0,
        };
        assert_eq!(note.end_beat(), 2.0);
    }

    #[test]
    fn sort_key_orders_by_beat_then_part_then_pitch() {
        let a = Note {
            pitch: 72,
            velocity: 80,
            beat: 0.0,
            duration: 1.0,
            part: 0,
        };
        let b = Note {
            pitch: 48,
            velocity: 80,
            beat: 0.0,
            duration: 1.0,
            part: 1,
        };
        let c = Note {
            pitch: 40,
            velocity: 80,
            beat: 0.5,
            duration: 1.0,
            part: 0,
        };
        assert!(a.sort_key() < b.sort_key());
        assert!(b.sort_key() < c.sort_key());
    }
}
