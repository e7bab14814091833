//! Music analysis and the advisory rulebook for piano continuations.
//!
//! - `key`: Krumhansl-Schmuckler key detection over a measure-grid piece
//! - `templates`: chord template matching over pitch-class sets
//! - `chords`: per-measure chord labels with Roman numerals
//! - `summary`: piece-level analysis bundle rendered for prompts
//! - `rules`: static and dynamically generated rules, grouped by category

pub mod chords;
pub mod key;
pub mod rules;
pub mod summary;
pub mod templates;
pub mod types;

pub use chords::label_measures;
pub use key::detect_key;
pub use rules::{parse_rule_array, Rule, RuleCategory, RuleError, Rulebook, Severity};
pub use summary::PieceSummary;
pub use types::{ChordQuality, KeyDetection, KeyMode, MeasureChord};
