use crate::piece::Piece;

/// Render a piece to Standard MIDI File format 0 bytes.
///
/// Single track: tempo, time signature, piano program on channel 0, then
/// every note from every part merged into one event stream. Note-offs sort
/// before note-ons at the same tick so back-to-back repeated pitches do not
/// cancel each other.
pub fn piece_to_midi(piece: &Piece) -> Vec<u8> {
    let ppq = piece.ppq as f64;
    let beats_per_measure = piece.beats_per_measure();

    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();
    events.push((0, tempo_event(piece.tempo_us)));
    events.push((
        0,
        time_sig_event(piece.time_sig.numerator, piece.time_sig.denominator),
    ));
    // Acoustic grand on channel 0
    events.push((0, vec![0xC0, 0]));

    for (measure_index, measure) in piece.measures.iter().enumerate() {
        let measure_start = measure_index as f64 * beats_per_measure;
        for note in &measure.notes {
            let onset_tick = ((measure_start + note.beat) * ppq).round() as u64;
            let duration_ticks = ((note.duration * ppq).round() as u64).max(1);
            events.push((onset_tick, vec![0x90, note.pitch, note.velocity]));
            events.push((onset_tick + duration_ticks, vec![0x80, note.pitch, 0]));
        }
    }

    events.sort_by(|a, b| {
        // note-offs first within a tick
        a.0.cmp(&b.0)
            .then_with(|| is_note_off(&b.1).cmp(&is_note_off(&a.1)))
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, data) in events {
        write_vlq(&mut track_data, tick.saturating_sub(last_tick) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // format 0
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&piece.ppq.to_be_bytes());
    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    buf.extend_from_slice(&track_data);
    buf
}

fn tempo_event(usec_per_beat: u32) -> Vec<u8> {
    vec![
        0xFF,
        0x51,
        0x03,
        (usec_per_beat >> 16) as u8,
        (usec_per_beat >> 8) as u8,
        usec_per_beat as u8,
    ]
}

fn time_sig_event(numerator: u8, denominator: u8) -> Vec<u8> {
    let denom_pow = (denominator as f64).log2() as u8;
    vec![0xFF, 0x58, 0x04, numerator, denom_pow, 0x18, 0x08]
}

fn is_note_off(data: &[u8]) -> bool {
    data.first().is_some_and(|status| status & 0xF0 == 0x80)
}

/// Append a MIDI variable-length quantity, most significant group first.
fn write_vlq(buf: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        rest >>= 7;
        count += 1;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        buf.push(groups[i] | continuation);
    }
}
