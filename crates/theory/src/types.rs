use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDetection {
    /// Tonic spelled for display ("C", "Db", "F#").
    pub root: String,
    /// Tonic as a pitch class, C = 0.
    pub root_pitch_class: u8,
    pub mode: KeyMode,
    /// Correlation score of the winning profile.
    pub confidence: f64,
}

impl KeyDetection {
    /// Human-readable key label, e.g. "C major" or "F# minor".
    pub fn label(&self) -> String {
        format!("{} {}", self.root, self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major6,
    Minor6,
    Add9,
    Power,
}

impl ChordQuality {
    /// Symbol suffix appended after the root name.
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "5",
        }
    }

    /// Whether Roman-numeral display uses lowercase for this quality.
    pub fn minor_third(&self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Minor6
                | ChordQuality::Diminished
                | ChordQuality::Diminished7
                | ChordQuality::HalfDiminished7
        )
    }
}

/// One labelled measure of the piece.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureChord {
    pub measure: usize,
    /// Display symbol such as "Dm" or "G7".
    pub symbol: String,
    pub root_pitch_class: u8,
    pub quality: ChordQuality,
    /// Roman numeral relative to the detected key, e.g. "V7" or "ii"
    pub numeral: String,
    pub confidence: f64,
}
