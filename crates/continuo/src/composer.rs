//! Composer planner agent. Plans exactly one new measure per call as a
//! plain-text instruction; it holds no tools and never edits the piece.

use anyhow::Result;
use score::Piece;
use theory::Rulebook;

use crate::provider::{ChatBackend, ChatMessage, GenerationConfig};
use crate::state::{AgentStep, ChatBudget};

/// How much recent context the composer sees.
const WINDOW_MEASURES: usize = 12;

const SYSTEM: &str = "You are an expert piano composer. You plan new \
                      material one measure at a time as precise \
                      natural-language instructions.";

fn request_text(rulebook: &Rulebook, piece: &Piece, style_prompt: &str) -> String {
    let window = piece.tail_window(WINDOW_MEASURES);
    let next_measure = piece.measure_count();
    format!(
        "{rules}\n\nRecent measures of the piece:\n{recent}\n\nStyle \
         request: {style_prompt}\n\nPlan the content of measure \
         {next_measure} only. Respect every rule above. State each note \
         as pitch, beat within the measure, and duration in beats. Do \
         not change any existing measure. Reply with the instruction \
         text only.",
        rules = rulebook.render_text(),
        recent = piece.render_measures(window),
    )
}

/// Ask for the next measure. The returned text goes to the handler
/// verbatim; it is not validated here.
pub async fn plan_measure(
    backend: &dyn ChatBackend,
    budget: &mut ChatBudget,
    rulebook: &Rulebook,
    piece: &Piece,
    style_prompt: &str,
) -> Result<AgentStep<String>> {
    if !budget.try_take() {
        return Ok(AgentStep::LimitReached);
    }
    let messages = [
        ChatMessage::system(SYSTEM),
        ChatMessage::user(request_text(rulebook, piece, style_prompt)),
    ];
    let config = GenerationConfig {
        temperature: 0.7,
        ..Default::default()
    };
    let response = backend.chat(&messages, None, &config).await?;
    let instruction = response.content.unwrap_or_default();
    tracing::info!(
        measure = piece.measure_count(),
        instruction = %instruction.trim(),
        "composer instruction"
    );
    Ok(AgentStep::Completed(instruction))
}
