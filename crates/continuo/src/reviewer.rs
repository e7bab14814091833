//! Reviewer agent. Checks the whole generated extension against the
//! rulebook and either signs off or issues correction instructions.

use anyhow::Result;
use score::Piece;
use theory::Rulebook;

use crate::provider::{ChatBackend, ChatMessage, GenerationConfig};
use crate::state::{AgentStep, ChatBudget};

const SYSTEM: &str = "You are a strict music-theory reviewer.";

fn request_text(rulebook: &Rulebook, piece: &Piece, original_measures: usize) -> String {
    let extension = piece.render_measures(original_measures..piece.measure_count());
    format!(
        "{rules}\n\nThe following measures were newly composed as an \
         extension of the piece (the original ends before measure \
         {original_measures}):\n{extension}\n\nCheck every measure \
         against every rule above. If the extension complies, reply \
         with exactly OK. Otherwise reply with correction \
         instructions, one per violating measure, stating the measure \
         number and the replacement content.",
        rules = rulebook.render_text(),
    )
}

/// The reviewer's decision on one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    /// No violations found.
    Clean,
    /// Correction instructions to hand to the handler.
    Corrections(String),
}

/// Review the extension. An empty reply or a bare OK counts as clean.
pub async fn review(
    backend: &dyn ChatBackend,
    budget: &mut ChatBudget,
    rulebook: &Rulebook,
    piece: &Piece,
    original_measures: usize,
) -> Result<AgentStep<ReviewVerdict>> {
    if !budget.try_take() {
        return Ok(AgentStep::LimitReached);
    }
    let messages = [
        ChatMessage::system(SYSTEM),
        ChatMessage::user(request_text(rulebook, piece, original_measures)),
    ];
    let config = GenerationConfig {
        temperature: 0.0,
        ..Default::default()
    };
    let response = backend.chat(&messages, None, &config).await?;
    let text = response.content.unwrap_or_default();
    let verdict = parse_verdict(&text);
    match &verdict {
        ReviewVerdict::Clean => tracing::info!("reviewer approved the extension"),
        ReviewVerdict::Corrections(corrections) => {
            tracing::info!(corrections = %corrections.trim(), "reviewer requested changes");
        }
    }
    Ok(AgentStep::Completed(verdict))
}

fn parse_verdict(text: &str) -> ReviewVerdict {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.trim_end_matches(['.', '!']).eq_ignore_ascii_case("ok") {
        ReviewVerdict::Clean
    } else {
        ReviewVerdict::Corrections(text.to_string())
    }
}
