//! Code-explanation handler.

use std::sync::Arc;

use crate::llm::{ChatMessage, ChatStream};
use crate::retrieval::{ContextSnippet, format_context};
use crate::stream::{OnPartial, StreamAggregator, TurnOutcome};

const INSTRUCTIONS: &str = "\
You are a helpful assistant that explains code with context.

Guidelines:
- Provide clear, concise explanations of the code's functionality.
- Reference the provided codebase context for accuracy.
- Explain naming conventions, logic, and any complex parts.
- Use comments and doc comments as part of your explanation.";

/// Explains code or concepts, grounded in retrieved context.
///
/// Streams incrementally like the other handlers. The reference
/// implementation collected the full text before returning; that was an
/// inconsistency with the other two handlers, not a design choice.
pub struct CodeExplainer {
    chat: Arc<dyn ChatStream>,
}

impl CodeExplainer {
    pub fn new(chat: Arc<dyn ChatStream>) -> Self {
        Self { chat }
    }

    pub async fn respond(
        &self,
        query: &str,
        context: &[ContextSnippet],
        char_budget: usize,
        on_partial: OnPartial<'_>,
    ) -> TurnOutcome {
        let prompt = build_prompt(query, context, char_budget);
        let stream = self
            .chat
            .start_stream(INSTRUCTIONS, vec![ChatMessage::user(prompt)])
            .await;
        StreamAggregator::new().run(stream, on_partial).await
    }
}

fn build_prompt(query: &str, context: &[ContextSnippet], char_budget: usize) -> String {
    format!(
        "Based on this codebase context:\n{}\nExplain the following code or concept: {}",
        format_context(context, char_budget),
        query
    )
}
