//! Error types for code-assist.

use std::time::Duration;

/// Top-level error type for the assistant.
///
/// Config errors stay at the binary boundary and retrieval errors are
/// swallowed by the retriever, so neither appears here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),
}

/// Configuration-related errors, raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the language-model collaborators.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Upstream unresponsive after {after:?}")]
    Unresponsive { after: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Errors from the context index. Always swallowed by the retriever.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Search failed: {reason}")]
    SearchFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to extract a routing decision from a classification transcript.
///
/// Caught by the supervisor, which substitutes the default destination.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("No destination keyword found in transcript ({lines} lines scanned)")]
    NoDecision { lines: usize },
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;
