//! Code-generation handler.

use std::sync::Arc;

use crate::llm::{ChatMessage, ChatStream};
use crate::retrieval::{ContextSnippet, format_context};
use crate::stream::{OnPartial, StreamAggregator, TurnOutcome};

const INSTRUCTIONS: &str = "\
You are a coding assistant that writes code grounded in a provided codebase context.

Instructions:
1. Generate functional, well-integrated code that aligns with the existing codebase.
2. Use your execution tool to test the generated code. If errors are found, \
analyze the feedback, correct the code, and retest. Repeat until the code runs cleanly.
3. Return ONLY the final, working version of the code.
4. Keep the naming conventions, types, and module structure of the existing codebase.
5. Include concise comments where they clarify intent.";

/// Generates code for a query, grounded in retrieved context, streaming
/// the answer incrementally. Tool-execution output from the model's
/// self-testing arrives as `ToolOutput` events.
pub struct CodeGenerator {
    chat: Arc<dyn ChatStream>,
}

impl CodeGenerator {
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
    if context.is_empty() {
        return query.to_string();
    }
    format!(
        "{}\n\nThis source code is provided as context for the code generation:\n{}",
        query,
        format_context(context, char_budget)
    )
}
