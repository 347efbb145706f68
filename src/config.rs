//! Configuration types.

use std::time::Duration;

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistConfig {
    /// Assistant name for identification.
    pub name: String,
    /// Whether retrieved codebase context is injected into handler prompts.
    pub use_context_augmentation: bool,
    /// Maximum number of context snippets fetched per query.
    pub top_k: usize,
    /// Per-snippet character budget when formatting context.
    pub snippet_char_budget: usize,
    /// Maximum time a single upstream call may take before the turn
    /// fails with an "upstream unresponsive" error.
    pub upstream_timeout: Duration,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            name: "code-assist".to_string(),
            use_context_augmentation: true,
            top_k: 1,
            snippet_char_budget: 1000,
            upstream_timeout: Duration::from_secs(120), // 2 minutes
        }
    }
}
