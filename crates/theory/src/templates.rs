use crate::types::ChordQuality;

/// Interval pattern a chord quality leaves on the pitch-class circle.
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub intervals: u16, // bit i set when the template contains interval i
    pub size: u32,
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << intervals[i];
            i += 1;
        }
        Self {
            quality,
            intervals: mask,
            size: intervals.len() as u32,
        }
    }
}

/// Recognized chord shapes, widest first so richer matches win ties.
pub static TEMPLATES: &[ChordTemplate] = &[
    ChordTemplate::new(ChordQuality::Dominant7, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major7, &[0, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor7, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::MinorMajor7, &[0, 3, 7, 11]),
    ChordTemplate::new(ChordQuality::Diminished7, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::HalfDiminished7, &[0, 3, 6, 10]),
    ChordTemplate::new(ChordQuality::Major6, &[0, 4, 7, 9]),
    ChordTemplate::new(ChordQuality::Minor6, &[0, 3, 7, 9]),
    ChordTemplate::new(ChordQuality::Add9, &[0, 2, 4, 7]),
    ChordTemplate::new(ChordQuality::Major, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, &[0, 2, 7]),
    ChordTemplate::new(ChordQuality::Power, &[0, 7]),
];

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Roots whose key signatures customarily use flat spelling.
pub static FLAT_KEY_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10];

pub fn note_name(pitch_class: u8, use_flats: bool) -> &'static str {
    let idx = (pitch_class % 12) as usize;
    if use_flats {
        NOTE_NAMES_FLAT[idx]
    } else {
        NOTE_NAMES_SHARP[idx]
    }
}

/// Best template match for a pitch-class set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordMatch {
    pub root_pitch_class: u8,
    pub quality: ChordQuality,
    pub score: f64,
}

impl ChordMatch {
    pub fn symbol(&self, use_flats: bool) -> String {
        format!(
            "{}{}",
            note_name(self.root_pitch_class, use_flats),
            self.quality.suffix()
        )
    }
}

fn interval_mask(pitch_classes: &[u8], root: u8) -> u16 {
    let mut mask = 0u16;
    for &pc in pitch_classes {
        mask |= 1 << ((pc + 12 - root) % 12);
    }
    mask
}

/// Label a pitch-class set with the best-fitting chord.
///
/// Every root and every template are scored; the score rewards template
/// coverage, docks non-chord tones, and nudges toward the root named by
/// `bass_hint` when the set is ambiguous. Sets smaller than two pitch
/// classes, or whose best score stays under the acceptance floor, get no
/// label.
pub fn match_chord(pitch_classes: &[u8], bass_hint: Option<u8>) -> Option<ChordMatch> {
    if pitch_classes.len() < 2 {
        return None;
    }

    let mut best: Option<ChordMatch> = None;

    for root in 0..12u8 {
        let sounding = interval_mask(pitch_classes, root);

        for template in TEMPLATES {
            let covered = (sounding & template.intervals).count_ones();
            if covered < template.size.min(2) {
                continue;
            }

            let outside = (sounding & !template.intervals).count_ones();
            let mut score = covered as f64 / template.size as f64 - outside as f64 * 0.1;

            if bass_hint.is_some_and(|bass| bass % 12 == root) {
                score += 0.15;
            }
            if sounding & template.intervals == template.intervals {
                score += 0.1;
            }

            if best.map_or(true, |b| score > b.score) {
                best = Some(ChordMatch {
                    root_pitch_class: root,
                    quality: template.quality,
                    score,
                });
            }
        }
    }

    best.filter(|b| b.score > 0.4).map(|b| ChordMatch {
        score: b.score.min(1.0),
        ..b
    })
}
