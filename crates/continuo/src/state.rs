//! Run phases, outcomes, and the shared invocation budget.

use serde::Serialize;

/// Where a run currently stands.
///
/// Instruction-carrying phases own the text that the next handler turn
/// will execute, so a phase value is self-contained.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Generate dynamic style rules from the excerpt.
    BuildRules,
    /// Ask the composer to plan the next measure.
    Compose,
    /// Apply a composer instruction to the piece.
    HandleCompose { instruction: String },
    /// Ask the reviewer to check the finished extension.
    Review,
    /// Apply reviewer corrections to the piece.
    HandleReview { instruction: String },
    /// Terminal.
    Done(Outcome),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::BuildRules => "build_rules",
            Phase::Compose => "compose",
            Phase::HandleCompose { .. } => "handle_compose",
            Phase::Review => "review",
            Phase::HandleReview { .. } => "handle_review",
            Phase::Done(_) => "done",
        }
    }
}

/// How a run ended. The MIDI output is written the same way in every
/// case; the outcome records how much the result was vetted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The reviewer signed off on the extension.
    VerifiedClean,
    /// Correction rounds ran out before the reviewer signed off.
    ReviewBudgetSpent,
    /// The run hit its invocation cap partway through.
    InvocationLimitReached,
}

impl Outcome {
    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::VerifiedClean => "reviewer approved the extension",
            Outcome::ReviewBudgetSpent => "review rounds exhausted without approval",
            Outcome::InvocationLimitReached => "invocation limit reached before review finished",
        }
    }
}

/// Result of asking an agent for one step. `LimitReached` means the
/// invocation budget ran out before the request could be sent.
#[derive(Debug)]
pub enum AgentStep<T> {
    Completed(T),
    LimitReached,
}

/// Counts chat invocations against the run-wide cap.
///
/// `try_take` is called before each request, so a spent budget stops
/// the run without issuing the call that would overrun it.
#[derive(Debug)]
pub struct ChatBudget {
    used: u32,
    limit: u32,
}

impl ChatBudget {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    /// Reserve one invocation. Returns false once the cap is reached.
    pub fn try_take(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub measures_added: usize,
    pub review_rounds: u32,
    pub invocations: u32,
}
