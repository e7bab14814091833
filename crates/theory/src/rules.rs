use serde::{Deserialize, Serialize};

use crate::summary::PieceSummary;

/// The seven fixed rule categories, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    ChordProgression,
    Harmony,
    Melody,
    Rhythm,
    Pianistic,
    Performance,
    Style,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 7] = [
        RuleCategory::ChordProgression,
        RuleCategory::Harmony,
        RuleCategory::Melody,
        RuleCategory::Rhythm,
        RuleCategory::Pianistic,
        RuleCategory::Performance,
        RuleCategory::Style,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            RuleCategory::ChordProgression => "Chord Progression",
            RuleCategory::Harmony => "Harmony",
            RuleCategory::Melody => "Melody",
            RuleCategory::Rhythm => "Rhythm",
            RuleCategory::Pianistic => "Pianistic",
            RuleCategory::Performance => "Performance",
            RuleCategory::Style => "Style",
        }
    }
}

/// Hard rules are disqualifying; soft rules are discouraged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hard,
    Soft,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Hard => write!(f, "hard"),
            Severity::Soft => write!(f, "soft"),
        }
    }
}

/// One compositional rule: a named constraint with a severity and an
/// optional suggested correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Rule {
    fn new(
        name: &str,
        category: RuleCategory,
        severity: Severity,
        text: &str,
        suggestion: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            severity,
            text: text.to_string(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule {index} has an empty {field} field")]
    EmptyField { index: usize, field: &'static str },
}

/// Parse a JSON array of rules from model output.
///
/// Tolerates a Markdown code fence around the array; anything else must be
/// strictly valid. Every rule must carry a non-empty name and text.
pub fn parse_rule_array(raw: &str) -> Result<Vec<Rule>, RuleError> {
    let text = strip_code_fence(raw.trim());
    let rules: Vec<Rule> = serde_json::from_str(text)?;
    for (index, rule) in rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(RuleError::EmptyField {
                index,
                field: "name",
            });
        }
        if rule.text.trim().is_empty() {
            return Err(RuleError::EmptyField {
                index,
                field: "text",
            });
        }
    }
    Ok(rules)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the fence line ("```json" etc.) and the closing fence
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// The knowledge base: static rules fixed at startup, dynamic rules
/// appended once per run, and the analyzed piece context.
///
/// Append-only after initialization. `render_text` output is deterministic
/// for a given state and is embedded verbatim in every downstream prompt.
#[derive(Debug, Clone)]
pub struct Rulebook {
    context: Option<PieceSummary>,
    static_rules: Vec<Rule>,
    dynamic_rules: Vec<Rule>,
    dynamic_loaded: bool,
}

impl Rulebook {
    pub fn new() -> Self {
        Self {
            context: None,
            static_rules: builtin_rules(),
            dynamic_rules: Vec::new(),
            dynamic_loaded: false,
        }
    }

    pub fn set_piece_context(&mut self, summary: PieceSummary) {
        self.context = Some(summary);
    }

    pub fn piece_context(&self) -> Option<&PieceSummary> {
        self.context.as_ref()
    }

    /// Append generated rules. Only the first call per run takes effect;
    /// repeat calls are ignored so the rule set cannot silently grow.
    pub fn add_dynamic_rules(&mut self, rules: Vec<Rule>) {
        if self.dynamic_loaded {
            tracing::warn!(
                dropped = rules.len(),
                "dynamic rules already loaded, ignoring repeat call"
            );
            return;
        }
        self.dynamic_loaded = true;
        self.dynamic_rules = rules;
    }

    pub fn static_rules(&self) -> &[Rule] {
        &self.static_rules
    }

    pub fn dynamic_rules(&self) -> &[Rule] {
        &self.dynamic_rules
    }

    pub fn rule_count(&self) -> usize {
        self.static_rules.len() + self.dynamic_rules.len()
    }

    /// Render the piece context and every rule, grouped by category in
    /// fixed order, static rules before dynamic within each group.
    pub fn render_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        if let Some(context) = &self.context {
            lines.push(context.render());
            lines.push(String::new());
        }

        for category in RuleCategory::ALL {
            let in_category: Vec<&Rule> = self
                .static_rules
                .iter()
                .chain(self.dynamic_rules.iter())
                .filter(|r| r.category == category)
                .collect();
            if in_category.is_empty() {
                continue;
            }

            lines.push(format!("### {} Rules", category.heading()));
            for rule in in_category {
                lines.push(format!(
                    "- **{}** ({}): {}",
                    rule.name.replace('_', " "),
                    rule.severity,
                    rule.text
                ));
                if let Some(suggestion) = &rule.suggestion {
                    lines.push(format!("  Fix: {}", suggestion));
                }
            }
            lines.push(String::new());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

impl Default for Rulebook {
    fn default() -> Self {
        Self::new()
    }
}

/// Static theory and compositional rules, fixed for every run.
fn builtin_rules() -> Vec<Rule> {
    use RuleCategory::*;
    use Severity::*;

    vec![
        Rule::new(
            "resolve_dominant_to_tonic",
            ChordProgression,
            Hard,
            "A V (dominant) chord should normally resolve to I (tonic) or vi in deceptive cadence.",
            "Try following a V chord with I (or vi for a deceptive resolution).",
        ),
        Rule::new(
            "avoid_parallel_fifths_root_movement",
            ChordProgression,
            Soft,
            "Avoid root progressions by parallel perfect fifths across consecutive chords.",
            "Insert passing or neighbor chords to break the fifths, or use inversion.",
        ),
        Rule::new(
            "no_parallel_fifths",
            Harmony,
            Hard,
            "No parallel perfect fifths between any pair of voices.",
            "Alter one voice by step to create contrary or oblique motion.",
        ),
        Rule::new(
            "no_doubled_leading_tone",
            Harmony,
            Hard,
            "Do not double the leading tone in minor keys.",
            "Use another scale degree for doubling (often 3 or 5).",
        ),
        Rule::new(
            "avoid_unplayable_intervals",
            Harmony,
            Hard,
            "Avoid writing intervals that exceed a 9th in one hand unless arpeggiated.",
            "Distribute wide intervals between hands or arpeggiate.",
        ),
        Rule::new(
            "no_hand_overlap",
            Harmony,
            Hard,
            "Avoid overlapping left and right hand note ranges unless intentional.",
            "Keep hands in separate registers to maintain clarity.",
        ),
        Rule::new(
            "stay_within_tessitura",
            Melody,
            Soft,
            "Melody should generally stay within a reasonable tessitura (< an 11th).",
            "Bring extreme leaps back toward the center with stepwise motion.",
        ),
        Rule::new(
            "no_augmented_seconds",
            Melody,
            Soft,
            "Avoid augmented 2nds in common-practice melody unless stylistically justified.",
            "Use chromatic passing tones or re-voice to form a minor 3rd instead.",
        ),
        Rule::new(
            "avoid_extreme_registers",
            Melody,
            Hard,
            "Avoid writing melodic lines that fall outside the standard piano range (A0-C8).",
            "Transpose extreme notes into a playable range.",
        ),
        Rule::new(
            "stay_within_piano_range",
            Melody,
            Hard,
            "All notes must stay within the standard piano range (A0 to C8).",
            "Transpose or omit notes that fall outside the playable piano range.",
        ),
        Rule::new(
            "avoid_constant_note_values",
            Rhythm,
            Soft,
            "Using the same note value repeatedly can make the rhythm monotonous.",
            "Vary note durations to create more rhythmic interest.",
        ),
        Rule::new(
            "syncopation_should_resolve",
            Rhythm,
            Soft,
            "Syncopated figures should resolve onto strong beats within the meter.",
            "Follow syncopation with a strong downbeat to ground the rhythm.",
        ),
        Rule::new(
            "balance_between_hands",
            Pianistic,
            Soft,
            "Ensure musical material is balanced between hands to avoid awkward textures.",
            "Distribute activity more evenly or alternate between hands.",
        ),
        Rule::new(
            "use_pedal_clearly",
            Pianistic,
            Soft,
            "Avoid overlapping harmonies that cause pedal-induced blurring.",
            "Lift pedal between harmonically distant chords.",
        ),
        Rule::new(
            "avoid_excessive_velocity_contrast",
            Performance,
            Soft,
            "Avoid unnatural contrasts in note velocity that break musical phrasing.",
            "Apply dynamic shaping more smoothly across phrases.",
        ),
        Rule::new(
            "use_articulation_consistently",
            Performance,
            Soft,
            "Articulation like staccato or legato should be used consistently within a phrase.",
            "Review articulation patterns to ensure clarity and consistency.",
        ),
    ]
}
