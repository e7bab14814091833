//! Agent pipeline that extends a solo-piano MIDI excerpt.
//!
//! A run moves through four agents: a rule builder that augments the
//! static rulebook with style rules inferred from the excerpt, a composer
//! that plans one measure at a time, a handler that applies the plan to
//! the piece through a fixed set of edit commands, and a reviewer that
//! checks the finished extension against the rulebook.
//!
//! - `config`: backend settings and run limits
//! - `provider`: chat backend trait and the OpenAI implementation
//! - `tools`: edit-command tool definitions and decoding
//! - `rule_builder`, `composer`, `handler`, `reviewer`: the four agents
//! - `state`: run phases, outcomes, and the invocation budget
//! - `orchestrator`: the state machine that drives a run

pub mod composer;
pub mod config;
pub mod handler;
pub mod orchestrator;
pub mod provider;
pub mod reviewer;
pub mod rule_builder;
pub mod state;
pub mod tools;

pub use config::{BackendConfig, RunLimits, DEFAULT_MODEL, DEFAULT_STYLE_PROMPT};
pub use provider::{
    ChatBackend, ChatMessage, ChatOutcome, FinishReason, GenerationConfig, OpenAiBackend, ToolDef,
    ToolInvocation,
};
pub use state::{ChatBudget, Outcome, Phase, RunReport};
