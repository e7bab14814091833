use serde::Deserialize;

use crate::note::Note;
use crate::piece::{Measure, Piece};
use crate::{Error, Result};

/// Velocity used when a note spec leaves it out.
pub const DEFAULT_VELOCITY: u8 = 80;

/// One note as it appears in tool arguments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteSpec {
    pub pitch: u8,
    /// Onset within the measure, in quarter-note beats from the barline.
    pub beat: f64,
    pub duration: f64,
    pub velocity: Option<u8>,
}

/// Partial update for a single note. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotePatch {
    pub pitch: Option<u8>,
    pub beat: Option<f64>,
    pub duration: Option<f64>,
    pub velocity: Option<u8>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.pitch.is_none()
            && self.beat.is_none()
            && self.duration.is_none()
            && self.velocity.is_none()
    }
}

/// The full set of edits an agent may request.
///
/// Deserialized from tool-call arguments after the dispatcher injects the
/// tool name under the `op` key, so unknown operations fail to decode
/// instead of silently doing nothing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    /// Add notes to a measure. `measure` may equal the current measure
    /// count, which opens one new empty measure at the end first.
    AddNotes {
        measure: usize,
        notes: Vec<NoteSpec>,
    },
    /// Remove notes from a measure by index into its sorted note list.
    RemoveNotes {
        measure: usize,
        indices: Vec<usize>,
    },
    /// Patch one note in place.
    EditNote {
        measure: usize,
        index: usize,
        pitch: Option<u8>,
        beat: Option<f64>,
        duration: Option<f64>,
        velocity: Option<u8>,
    },
    /// Replace the entire contents of an existing measure.
    ReplaceMeasure {
        measure: usize,
        notes: Vec<NoteSpec>,
    },
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::AddNotes { .. } => "add_notes",
            EditCommand::RemoveNotes { .. } => "remove_notes",
            EditCommand::EditNote { .. } => "edit_note",
            EditCommand::ReplaceMeasure { .. } => "replace_measure",
        }
    }

    /// Validate the command against the piece, then apply it.
    ///
    /// Nothing is mutated on error, so a rejected command leaves the piece
    /// exactly as it was. Returns a short confirmation sentence suitable
    /// for feeding back to the requesting agent.
    pub fn apply(&self, piece: &mut Piece) -> Result<String> {
        match self {
            EditCommand::AddNotes { measure, notes } => {
                let len = piece.measure_count();
                if *measure > len {
                    return Err(Error::MeasureOutOfRange {
                        measure: *measure,
                        len,
                    });
                }
                for spec in notes {
                    validate_spec(spec, piece.beats_per_measure())?;
                }
                if *measure == len {
                    piece.measures.push(Measure::default());
                }
                let target = &mut piece.measures[*measure];
                target
                    .notes
                    .extend(notes.iter().map(|spec| note_from_spec(spec)));
                target.sort();
                Ok(format!("Added {} note(s) to measure {}.", notes.len(), measure))
            }
            EditCommand::RemoveNotes { measure, indices } => {
                let target = lookup_measure(piece, *measure)?;
                let len = target.notes.len();
                for &index in indices {
                    if index >= len {
                        return Err(Error::NoteOutOfRange {
                            index,
                            measure: *measure,
                            len,
                        });
                    }
                }
                let mut ordered = indices.clone();
                ordered.sort_unstable();
                ordered.dedup();
                let target = &mut piece.measures[*measure];
                for index in ordered.iter().rev() {
                    target.notes.remove(*index);
                }
                Ok(format!(
                    "Removed {} note(s) from measure {}.",
                    ordered.len(),
                    measure
                ))
            }
            EditCommand::EditNote {
                measure,
                index,
                pitch,
                beat,
                duration,
                velocity,
            } => {
                let patch = NotePatch {
                    pitch: *pitch,
                    beat: *beat,
                    duration: *duration,
                    velocity: *velocity,
                };
                let target = lookup_measure(piece, *measure)?;
                if *index >= target.notes.len() {
                    return Err(Error::NoteOutOfRange {
                        index: *index,
                        measure: *measure,
                        len: target.notes.len(),
                    });
                }
                validate_patch(&patch, piece.beats_per_measure())?;
                let target = &mut piece.measures[*measure];
                let note = &mut target.notes[*index];
                if let Some(pitch) = patch.pitch {
                    note.pitch = pitch;
                }
                if let Some(beat) = patch.beat {
                    note.beat = beat;
                }
                if let Some(duration) = patch.duration {
                    note.duration = duration;
                }
                if let Some(velocity) = patch.velocity {
                    note.velocity = velocity.clamp(1, 127);
                }
                target.sort();
                Ok(format!("Updated note {} in measure {}.", index, measure))
            }
            EditCommand::ReplaceMeasure { measure, notes } => {
                lookup_measure(piece, *measure)?;
                for spec in notes {
                    validate_spec(spec, piece.beats_per_measure())?;
                }
                let target = &mut piece.measures[*measure];
                target.notes = notes.iter().map(|spec| note_from_spec(spec)).collect();
                target.sort();
                Ok(format!(
                    "Replaced measure {} with {} note(s).",
                    measure,
                    notes.len()
                ))
            }
        }
    }
}

fn lookup_measure<'a>(piece: &'a Piece, measure: usize) -> Result<&'a Measure> {
    piece
        .measures
        .get(measure)
        .ok_or_else(|| Error::MeasureOutOfRange {
            measure,
            len: piece.measure_count(),
        })
}

fn validate_spec(spec: &NoteSpec, beats_per_measure: f64) -> Result<()> {
    if spec.pitch > 127 {
        return Err(Error::BadPitch(spec.pitch));
    }
    if !spec.duration.is_finite() || spec.duration <= 0.0 {
        return Err(Error::BadDuration(spec.duration));
    }
    if !spec.beat.is_finite() || spec.beat < 0.0 || spec.beat >= beats_per_measure {
        return Err(Error::BeatOutOfMeasure {
            beat: spec.beat,
            beats_per_measure,
        });
    }
    Ok(())
}

fn validate_patch(patch: &NotePatch, beats_per_measure: f64) -> Result<()> {
    if let Some(pitch) = patch.pitch {
        if pitch > 127 {
            return Err(Error::BadPitch(pitch));
        }
    }
    if let Some(duration) = patch.duration {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::BadDuration(duration));
        }
    }
    if let Some(beat) = patch.beat {
        if !beat.is_finite() || beat < 0.0 || beat >= beats_per_measure {
            return Err(Error::BeatOutOfMeasure {
                beat,
                beats_per_measure,
            });
        }
    }
    Ok(())
}

fn note_from_spec(spec: &NoteSpec) -> Note {
    Note {
        pitch: spec.pitch,
        velocity: spec.velocity.unwrap_or(DEFAULT_VELOCITY).clamp(1, 127),
        beat: spec.beat,
        duration: spec.duration,
        part: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::TimeSig;
    use pretty_assertions::assert_eq;

    fn spec(pitch: u8, beat: f64, duration: f64) -> NoteSpec {
        NoteSpec {
            pitch,
            beat,
            duration,
            velocity: None,
        }
    }

    fn one_measure_piece() -> Piece {
        let mut piece = Piece::empty(TimeSig::COMMON);
        let cmd = EditCommand::AddNotes {
            measure: 0,
            notes: vec![spec(60, 0.0, 1.0), spec(64, 1.0, 1.0), spec(67, 2.0, 2.0)],
        };
        cmd.apply(&mut piece).unwrap();
        piece
    }

    #[test]
    fn add_notes_sorts_by_onset() {
        let mut piece = Piece::empty(TimeSig::COMMON);
        let cmd = EditCommand::AddNotes {
            measure: 0,
            notes: vec![spec(67, 2.0, 1.0), spec(60, 0.0, 1.0)],
        };
        let msg = cmd.apply(&mut piece).unwrap();
        assert_eq!(msg, "Added 2 note(s) to measure 0.");
        let pitches: Vec<u8> = piece.measures[0].notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 67]);
        assert_eq!(piece.measures[0].notes[0].velocity, DEFAULT_VELOCITY);
    }

    #[test]
    fn add_notes_opens_one_trailing_measure() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::AddNotes {
            measure: 1,
            notes: vec![spec(72, 0.0, 4.0)],
        };
        cmd.apply(&mut piece).unwrap();
        assert_eq!(piece.measure_count(), 2);

        let gap = EditCommand::AddNotes {
            measure: 5,
            notes: vec![spec(72, 0.0, 1.0)],
        };
        let err = gap.apply(&mut piece).unwrap_err();
        assert!(matches!(err, Error::MeasureOutOfRange { measure: 5, len: 2 }));
    }

    #[test]
    fn add_notes_rejects_beat_past_barline() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::AddNotes {
            measure: 0,
            notes: vec![spec(60, 4.0, 1.0)],
        };
        let err = cmd.apply(&mut piece).unwrap_err();
        assert!(matches!(err, Error::BeatOutOfMeasure { .. }));
        // rejected command must not mutate
        assert_eq!(piece.note_count(), 3);
    }

    #[test]
    fn add_notes_rejects_nonpositive_duration() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::AddNotes {
            measure: 0,
            notes: vec![spec(60, 0.0, 0.0)],
        };
        assert!(matches!(
            cmd.apply(&mut piece).unwrap_err(),
            Error::BadDuration(_)
        ));
    }

    #[test]
    fn remove_notes_handles_unsorted_duplicate_indices() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::RemoveNotes {
            measure: 0,
            indices: vec![2, 0, 2],
        };
        let msg = cmd.apply(&mut piece).unwrap();
        assert_eq!(msg, "Removed 2 note(s) from measure 0.");
        let pitches: Vec<u8> = piece.measures[0].notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![64]);
    }

    #[test]
    fn remove_notes_rejects_bad_index() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::RemoveNotes {
            measure: 0,
            indices: vec![0, 9],
        };
        let err = cmd.apply(&mut piece).unwrap_err();
        assert!(matches!(err, Error::NoteOutOfRange { index: 9, .. }));
        assert_eq!(piece.note_count(), 3);
    }

    #[test]
    fn edit_note_patches_and_resorts() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::EditNote {
            measure: 0,
            index: 0,
            pitch: Some(71),
            beat: Some(3.0),
            duration: None,
            velocity: Some(200),
        };
        cmd.apply(&mut piece).unwrap();
        let last = piece.measures[0].notes.last().unwrap();
        assert_eq!(last.pitch, 71);
        assert_eq!(last.beat, 3.0);
        assert_eq!(last.velocity, 127);
    }

    #[test]
    fn replace_measure_swaps_content() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::ReplaceMeasure {
            measure: 0,
            notes: vec![spec(48, 0.0, 4.0)],
        };
        let msg = cmd.apply(&mut piece).unwrap();
        assert_eq!(msg, "Replaced measure 0 with 1 note(s).");
        assert_eq!(piece.measures[0].notes.len(), 1);
        assert_eq!(piece.measures[0].notes[0].pitch, 48);
    }

    #[test]
    fn replace_measure_requires_existing_measure() {
        let mut piece = one_measure_piece();
        let cmd = EditCommand::ReplaceMeasure {
            measure: 1,
            notes: vec![],
        };
        assert!(matches!(
            cmd.apply(&mut piece).unwrap_err(),
            Error::MeasureOutOfRange { .. }
        ));
    }

    #[test]
    fn decodes_from_tagged_json() {
        let cmd: EditCommand = serde_json::from_value(serde_json::json!({
            "op": "add_notes",
            "measure": 3,
            "notes": [{ "pitch": 60, "beat": 0.0, "duration": 1.5 }],
        }))
        .unwrap();
        assert_eq!(
            cmd,
            EditCommand::AddNotes {
                measure: 3,
                notes: vec![NoteSpec {
                    pitch: 60,
                    beat: 0.0,
                    duration: 1.5,
                    velocity: None,
                }],
            }
        );

        let cmd: EditCommand = serde_json::from_value(serde_json::json!({
            "op": "edit_note",
            "measure": 1,
            "index": 2,
            "pitch": 62,
        }))
        .unwrap();
        assert_eq!(cmd.name(), "edit_note");

        let bad = serde_json::from_value::<EditCommand>(serde_json::json!({
            "op": "transpose_piece",
            "measure": 0,
        }));
        assert!(bad.is_err());
    }
}
