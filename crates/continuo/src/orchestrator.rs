//! The state machine that drives an extension run.
//!
//! `BuildRules` runs once, then the composer/handler pair loops until
//! the piece reaches its target length, then the reviewer/handler pair
//! loops until the reviewer signs off or the review cap is hit. The
//! invocation budget is checked before every chat call; a spent budget
//! forces `Done` from any phase.

use anyhow::Result;
use score::Piece;
use theory::{PieceSummary, Rulebook};

use crate::composer;
use crate::config::RunLimits;
use crate::handler;
use crate::provider::ChatBackend;
use crate::reviewer::{self, ReviewVerdict};
use crate::rule_builder;
use crate::state::{AgentStep, ChatBudget, Outcome, Phase, RunReport};
use crate::tools;

/// Extend `piece` in place and report how the run ended.
///
/// The reviewer is only ever entered once the piece holds at least
/// `target_measures` new measures, and its (cap+1)-th invocation is
/// never issued: the cap is checked on entering `Review`, before any
/// request goes out.
pub async fn run(
    backend: &dyn ChatBackend,
    piece: &mut Piece,
    limits: &RunLimits,
    style_prompt: &str,
) -> Result<RunReport> {
    let original_measures = piece.measure_count();
    let target_total = original_measures + limits.target_measures as usize;

    let mut rulebook = Rulebook::new();
    rulebook.set_piece_context(PieceSummary::analyze(piece));

    let composer_tools = tools::composer_toolset();
    let reviewer_tools = tools::reviewer_toolset();

    let mut budget = ChatBudget::new(limits.recursion_limit);
    let mut review_rounds = 0u32;
    let mut phase = Phase::BuildRules;

    let outcome = loop {
        tracing::debug!(
            phase = phase.name(),
            measures = piece.measure_count(),
            invocations = budget.used(),
            "orchestrator step"
        );
        phase = match phase {
            Phase::BuildRules => {
                match rule_builder::build_rules(backend, &mut budget, &rulebook).await? {
                    AgentStep::LimitReached => Phase::Done(Outcome::InvocationLimitReached),
                    AgentStep::Completed(rules) => {
                        rulebook.add_dynamic_rules(rules);
                        Phase::Compose
                    }
                }
            }

            Phase::Compose => {
                match composer::plan_measure(backend, &mut budget, &rulebook, piece, style_prompt)
                    .await?
                {
                    AgentStep::LimitReached => Phase::Done(Outcome::InvocationLimitReached),
                    AgentStep::Completed(instruction) => Phase::HandleCompose { instruction },
                }
            }

            Phase::HandleCompose { instruction } => {
                let report = handler::execute_instruction(
                    backend,
                    &mut budget,
                    piece,
                    &composer_tools,
                    &instruction,
                )
                .await?;
                if report.limit_hit {
                    Phase::Done(Outcome::InvocationLimitReached)
                } else if piece.measure_count() >= target_total {
                    Phase::Review
                } else {
                    Phase::Compose
                }
            }

            Phase::Review => {
                if review_rounds >= limits.max_review_iterations {
                    Phase::Done(Outcome::ReviewBudgetSpent)
                } else {
                    match reviewer::review(backend, &mut budget, &rulebook, piece, original_measures)
                        .await?
                    {
                        AgentStep::LimitReached => Phase::Done(Outcome::InvocationLimitReached),
                        AgentStep::Completed(ReviewVerdict::Clean) => {
                            Phase::Done(Outcome::VerifiedClean)
                        }
                        AgentStep::Completed(ReviewVerdict::Corrections(instruction)) => {
                            Phase::HandleReview { instruction }
                        }
                    }
                }
            }

            Phase::HandleReview { instruction } => {
                let report = handler::execute_instruction(
                    backend,
                    &mut budget,
                    piece,
                    &reviewer_tools,
                    &instruction,
                )
                .await?;
                review_rounds += 1;
                if report.limit_hit {
                    Phase::Done(Outcome::InvocationLimitReached)
                } else {
                    Phase::Review
                }
            }

            Phase::Done(outcome) => break outcome,
        };
    };

    let report = RunReport {
        outcome,
        measures_added: piece.measure_count() - original_measures,
        review_rounds,
        invocations: budget.used(),
    };
    tracing::info!(
        outcome = outcome.describe(),
        measures_added = report.measures_added,
        review_rounds = report.review_rounds,
        invocations = report.invocations,
        "run finished"
    );
    Ok(report)
}
