//! Collaborator interfaces for language-model backends.
//!
//! The assistant never talks to a model directly — it drives two trait
//! seams: `ChatStream` for streamed completions and `ToolAutomation` for
//! the repository-automation backend. `llm::mistral` is the concrete
//! client for both.

pub mod mistral;

pub use mistral::MistralClient;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One event from an upstream completion stream.
///
/// `Error` and `Done` are terminal: nothing after either is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental response text.
    Content(String),
    /// Output from a tool the model executed mid-stream.
    ToolOutput(String),
    /// Upstream failure; the message is the turn's only failure channel.
    Error(String),
    /// Normal completion.
    Done,
}

/// A stream of events from one in-flight completion.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Streamed-completion collaborator.
#[async_trait]
pub trait ChatStream: Send + Sync {
    /// Start a streamed completion for the given instructions and messages.
    async fn start_stream(
        &self,
        instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// A tool the automation backend invoked while handling a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: String,
}

/// Result of a tool-automation run: final text plus the tools used.
#[derive(Debug, Clone, Default)]
pub struct AutomationOutcome {
    pub final_text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Repository-automation collaborator.
///
/// Runs to completion rather than streaming; tool invocations are
/// reported after the fact so the handler can surface them.
#[async_trait]
pub trait ToolAutomation: Send + Sync {
    async fn run(
        &self,
        instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<AutomationOutcome, LlmError>;
}

/// Configuration for the concrete LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    pub fn new(api_key: secrecy::SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: "https://api.mistral.ai".to_string(),
        }
    }
}
