//! Repository-automation handler.
//!
//! Unlike the other two handlers this one is stateful across turns: it
//! sends the full session transcript to the automation backend so that
//! follow-ups ("now close it") resolve against earlier turns.

use std::sync::Arc;

use crate::llm::{ChatMessage, ToolAutomation, ToolInvocation};
use crate::stream::{OnPartial, TurnOutcome};

const INSTRUCTIONS: &str = "\
You are a repository assistant. You can handle issues, pull requests, and \
other repository management tasks. Use your repository-automation tools to \
perform the requested operations, and report what you did.";

/// Handles repository tasks through the `ToolAutomation` collaborator,
/// surfacing each tool invocation as a visible line before the final text.
pub struct RepositoryAgent {
    automation: Arc<dyn ToolAutomation>,
}

impl RepositoryAgent {
    pub fn new(automation: Arc<dyn ToolAutomation>) -> Self {
        Self { automation }
    }

    /// Run the automation backend over the session transcript.
    ///
    /// `transcript` must already include the current query as its last
    /// user message.
    pub async fn respond(
        &self,
        transcript: Vec<ChatMessage>,
        on_partial: OnPartial<'_>,
    ) -> TurnOutcome {
        match self.automation.run(INSTRUCTIONS, transcript).await {
            Ok(outcome) => {
                let text = render(&outcome.tool_calls, &outcome.final_text);
                on_partial(&text);
                TurnOutcome::Completed(text)
            }
            Err(e) => TurnOutcome::Failed(e.to_string()),
        }
    }
}

fn render(tool_calls: &[ToolInvocation], final_text: &str) -> String {
    let mut out = String::new();
    for call in tool_calls {
        out.push_str(&format!(
            "Used tool: **{}**\nArguments: `{}`\n\n",
            call.name, call.arguments
        ));
    }
    out.push_str(final_text);
    out
}
