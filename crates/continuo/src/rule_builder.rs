//! Rule builder agent. Runs once at the start of a run and asks the
//! model for piece-specific style rules to add to the rulebook.

use anyhow::{Context, Result};
use theory::{parse_rule_array, Rule, Rulebook};

use crate::provider::{ChatBackend, ChatMessage, GenerationConfig};
use crate::state::{AgentStep, ChatBudget};

const SYSTEM: &str = "You are a music-theory assistant.";

fn request_text(rulebook: &Rulebook) -> String {
    format!(
        "Below is a summary of a piano piece and the rules already in \
         force.\n\n{rules}\n\nInfer additional stylistic rules that an \
         extension of this piece should follow. Cover the chord \
         progression pattern, note density and texture, melodic interval \
         range, and characteristic rhythms. Do not repeat rules already \
         present.\n\nReturn ONLY a JSON array of rule objects with \
         fields: name, category, severity, text, suggestion. Allowed \
         categories: chord_progression, harmony, melody, rhythm, \
         pianistic, performance, style. Allowed severities: hard, soft.",
        rules = rulebook.render_text()
    )
}

/// Ask the model for dynamic rules. A malformed response is a run
/// failure; there is no retry.
pub async fn build_rules(
    backend: &dyn ChatBackend,
    budget: &mut ChatBudget,
    rulebook: &Rulebook,
) -> Result<AgentStep<Vec<Rule>>> {
    if !budget.try_take() {
        return Ok(AgentStep::LimitReached);
    }
    let messages = [
        ChatMessage::system(SYSTEM),
        ChatMessage::user(request_text(rulebook)),
    ];
    let config = GenerationConfig {
        temperature: 0.0,
        ..Default::default()
    };
    let response = backend.chat(&messages, None, &config).await?;
    let text = response.content.unwrap_or_default();
    let rules = parse_rule_array(&text).context("rule builder returned unusable rules")?;
    for rule in &rules {
        tracing::info!(
            name = %rule.name,
            category = rule.category.heading(),
            severity = %rule.severity,
            "dynamic rule"
        );
    }
    Ok(AgentStep::Completed(rules))
}
