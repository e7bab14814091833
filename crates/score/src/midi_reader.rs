use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::note::Note;
use crate::piece::{Measure, Piece, TimeSig, DEFAULT_TEMPO_US};
use crate::{Error, Result};

struct RawNote {
    onset_tick: u64,
    offset_tick: u64,
    pitch: u8,
    velocity: u8,
    group: (usize, u8),
}

/// Read MIDI bytes into a measure-grid piece.
///
/// Note-on/note-off events are paired per (channel, pitch) with a stack so
/// overlapping repeats resolve; a note-on with velocity 0 counts as a
/// note-off. Each sounding (track, channel) group becomes one part in group
/// order, and more than two such groups is an error. The first tempo and
/// time signature events fix the grid for the whole piece; notes keep their
/// full duration in the measure containing their onset.
pub fn read_piece(bytes: &[u8]) -> Result<Piece> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(_, _) => 480,
    };

    let mut raw_notes: Vec<RawNote> = Vec::new();
    let mut tempo_us: Option<u32> = None;
    let mut time_sig: Option<TimeSig> = None;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        // open notes per (channel, pitch), stacked for overlapping repeats
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_us.get_or_insert(tempo.as_int());
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_sig.get_or_insert(TimeSig {
                        numerator: num,
                        denominator: 1u8 << denom_pow,
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            // any NoteOn left here carries velocity 0
                            if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                                if let Some((onset, velocity)) = stack.pop() {
                                    raw_notes.push(RawNote {
                                        onset_tick: onset,
                                        offset_tick: current_tick,
                                        pitch: key.as_int(),
                                        velocity,
                                        group: (track_index, ch),
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // notes still open when the track ends stop at its final tick
        for ((ch, pitch), stack) in &pending {
            for &(onset, velocity) in stack {
                raw_notes.push(RawNote {
                    onset_tick: onset,
                    offset_tick: current_tick,
                    pitch: *pitch,
                    velocity,
                    group: (track_index, *ch),
                });
            }
        }
    }

    if raw_notes.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut groups: Vec<(usize, u8)> = raw_notes.iter().map(|n| n.group).collect();
    groups.sort_unstable();
    groups.dedup();
    if groups.len() > 2 {
        return Err(Error::TooManyParts(groups.len()));
    }

    let time_sig = time_sig.unwrap_or(TimeSig::COMMON);
    let beats_per_measure = time_sig.beats_per_measure();
    let ppq_f = ppq as f64;

    let mut measures: Vec<Measure> = Vec::new();
    for raw in &raw_notes {
        let onset_beat = raw.onset_tick as f64 / ppq_f;
        let duration_ticks = raw.offset_tick.saturating_sub(raw.onset_tick).max(1);
        let measure = (onset_beat / beats_per_measure).floor() as usize;
        if measure >= measures.len() {
            measures.resize(measure + 1, Measure::default());
        }
        let part = groups.iter().position(|g| *g == raw.group).unwrap_or(0) as u8;
        measures[measure].notes.push(Note {
            pitch: raw.pitch,
            velocity: raw.velocity,
            beat: onset_beat - measure as f64 * beats_per_measure,
            duration: duration_ticks as f64 / ppq_f,
            part,
        });
    }
    for measure in &mut measures {
        measure.sort();
    }

    Ok(Piece {
        ppq,
        tempo_us: tempo_us.unwrap_or(DEFAULT_TEMPO_US),
        time_sig,
        measures,
    })
}
