//! Backend settings and per-run limits.

/// Model used when neither the flag nor `CONTINUO_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Style guidance used when the caller gives none.
pub const DEFAULT_STYLE_PROMPT: &str = "Extend the excerpt in a similar style.";

/// Connection settings for an OpenAI-compatible chat backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the API. `None` uses the stock OpenAI endpoint.
    pub base_url: Option<String>,
    /// API key. `None` leaves whatever the client library resolves itself.
    pub api_key: Option<String>,
    /// Model name sent with every request.
    pub model: String,
    /// Completion token cap, if the caller wants one.
    pub max_tokens: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
        }
    }
}

/// Caps that bound a single extension run.
///
/// `recursion_limit` counts every chat invocation across all four agents
/// and is checked before each call. `max_review_iterations` counts
/// reviewer responses that were handed to the handler.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Measures to add beyond the input excerpt.
    pub target_measures: u32,
    /// Total chat invocations allowed in one run.
    pub recursion_limit: u32,
    /// Reviewer correction rounds allowed before giving up.
    pub max_review_iterations: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            target_measures: 8,
            recursion_limit: 50,
            max_review_iterations: 3,
        }
    }
}
