use score::Piece;

use crate::templates::{note_name, FLAT_KEY_ROOTS};
use crate::types::{KeyDetection, KeyMode};

/// Probe-tone profile for major keys (Krumhansl & Kessler), tonic first.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Probe-tone profile for minor keys, tonic first.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Krumhansl-Schmuckler key finding over the whole piece.
///
/// Each pitch class is weighted by its total sounding duration in beats,
/// then the weight vector is scored against every rotation of the two
/// profiles. The tonic and mode with the highest Pearson correlation win;
/// a silent piece reports C major with zero confidence.
pub fn detect_key(piece: &Piece) -> KeyDetection {
    let mut weights = [0.0_f64; 12];
    for note in piece.notes() {
        weights[(note.pitch % 12) as usize] += note.duration;
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return KeyDetection {
            root: "C".into(),
            root_pitch_class: 0,
            mode: KeyMode::Major,
            confidence: 0.0,
        };
    }
    for w in &mut weights {
        *w /= total;
    }

    let mut best = (0u8, KeyMode::Major, f64::MIN);
    for tonic in 0..12u8 {
        // Shift the weights so the candidate tonic sits at index 0
        let mut shifted = [0.0_f64; 12];
        for (i, slot) in shifted.iter_mut().enumerate() {
            *slot = weights[(i + tonic as usize) % 12];
        }

        for (mode, profile) in [
            (KeyMode::Major, &MAJOR_PROFILE),
            (KeyMode::Minor, &MINOR_PROFILE),
        ] {
            let score = correlation(&shifted, profile);
            if score > best.2 {
                best = (tonic, mode, score);
            }
        }
    }

    let (tonic, mode, score) = best;
    KeyDetection {
        root: note_name(tonic, FLAT_KEY_ROOTS.contains(&tonic)).to_string(),
        root_pitch_class: tonic,
        mode,
        confidence: (score * 1e4).round() / 1e4,
    }
}

/// Pearson correlation between a shifted weight vector and a profile.
fn correlation(sample: &[f64; 12], profile: &[f64; 12]) -> f64 {
    let sample_mean = sample.iter().sum::<f64>() / 12.0;
    let profile_mean = profile.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut sample_var = 0.0;
    let mut profile_var = 0.0;
    for (s, p) in sample.iter().zip(profile) {
        let ds = s - sample_mean;
        let dp = p - profile_mean;
        cov += ds * dp;
        sample_var += ds * ds;
        profile_var += dp * dp;
    }

    let scale = (sample_var * profile_var).sqrt();
    if scale < 1e-10 {
        return 0.0;
    }
    cov / scale
}
