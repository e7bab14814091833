pub mod edit;
pub mod midi_reader;
pub mod midi_writer;
pub mod note;
pub mod piece;

pub use edit::{EditCommand, NotePatch, NoteSpec};
pub use midi_reader::read_piece;
pub use midi_writer::piece_to_midi;
pub use note::{pitch_name, Note};
pub use piece::{Measure, PartProfile, Piece, TimeSig};

/// Errors from score model and MIDI operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("input contains no notes")]
    EmptyInput,

    #[error("input has {0} sounding parts, expected one or two")]
    TooManyParts(usize),

    #[error("measure {measure} out of range (piece has {len} measures)")]
    MeasureOutOfRange { measure: usize, len: usize },

    #[error("note index {index} out of range in measure {measure} ({len} notes)")]
    NoteOutOfRange {
        index: usize,
        measure: usize,
        len: usize,
    },

    #[error("beat {beat} falls outside a {beats_per_measure}-beat measure")]
    BeatOutOfMeasure { beat: f64, beats_per_measure: f64 },

    #[error("duration {0} is not a positive finite beat count")]
    BadDuration(f64),

    #[error("pitch {0} is outside the MIDI range 0-127")]
    BadPitch(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
