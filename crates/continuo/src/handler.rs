//! Handler agent. Takes one natural-language instruction and applies it
//! to the piece through the edit-command tools. This is the only place
//! the piece is mutated during a run.
//!
//! Edits apply in place as the model calls tools. There is no rollback;
//! if the budget runs out mid-instruction the piece keeps whatever was
//! already applied.

use anyhow::Result;
use score::Piece;

use crate::provider::{ChatBackend, ChatMessage, FinishReason, GenerationConfig, ToolDef};
use crate::state::ChatBudget;
use crate::tools;

const SYSTEM: &str = "You are a MIDI editing assistant. Carry out the \
                      instruction you are given using the available \
                      tools. Measure and note indices are zero-based. \
                      When the instruction is fully applied, reply with \
                      a short confirmation and no further tool calls.";

fn request_text(piece: &Piece, instruction: &str) -> String {
    format!(
        "The piece currently has {count} measures in {time_sig} time \
         ({beats} beats per measure).\n\nInstruction:\n{instruction}",
        count = piece.measure_count(),
        time_sig = piece.time_sig,
        beats = piece.beats_per_measure(),
    )
}

/// What one handler pass did.
#[derive(Debug)]
pub struct HandlerReport {
    /// Edit commands that decoded and applied successfully.
    pub commands_applied: usize,
    /// The invocation budget ran out before the model finished.
    pub limit_hit: bool,
    /// Final assistant text, if the model said anything on finishing.
    pub note: Option<String>,
}

/// Run the tool loop until the model stops calling tools. Failed calls
/// are reported back to the model as tool errors and the loop goes on;
/// the piece is only changed by commands that validated.
pub async fn execute_instruction(
    backend: &dyn ChatBackend,
    budget: &mut ChatBudget,
    piece: &mut Piece,
    toolset: &[ToolDef],
    instruction: &str,
) -> Result<HandlerReport> {
    let mut messages = vec![
        ChatMessage::system(SYSTEM),
        ChatMessage::user(request_text(piece, instruction)),
    ];
    let config = GenerationConfig {
        temperature: 0.0,
        ..Default::default()
    };
    let mut applied = 0usize;
    let mut round = 0u32;

    loop {
        if !budget.try_take() {
            tracing::warn!(round, "invocation budget spent mid-instruction");
            return Ok(HandlerReport {
                commands_applied: applied,
                limit_hit: true,
                note: None,
            });
        }
        tracing::debug!(round, "handler round");

        let response = backend.chat(&messages, Some(toolset), &config).await?;
        match response.finish_reason {
            FinishReason::Stop | FinishReason::Length => {
                return Ok(HandlerReport {
                    commands_applied: applied,
                    limit_hit: false,
                    note: response.content,
                });
            }
            FinishReason::ToolCalls => {
                if response.tool_calls.is_empty() {
                    anyhow::bail!("tool-calls finish reason but no tool calls");
                }
                messages.push(ChatMessage::assistant_calls(
                    response.content.clone(),
                    &response.tool_calls,
                ));
                for call in &response.tool_calls {
                    let result = tools::decode(&call.name, &call.arguments)
                        .and_then(|command| command.apply(piece).map_err(anyhow::Error::from));
                    let (output, is_error) = match result {
                        Ok(confirmation) => (confirmation, false),
                        Err(e) => (format!("{e:#}"), true),
                    };
                    if is_error {
                        tracing::warn!(tool = %call.name, error = %output, "edit rejected");
                    } else {
                        applied += 1;
                        tracing::info!(tool = %call.name, result = %output, "edit applied");
                    }
                    messages.push(ChatMessage::tool(call.id.clone(), output));
                }
            }
            FinishReason::Other => {
                anyhow::bail!("unexpected finish reason from model");
            }
        }
        round += 1;
    }
}
