//! End-to-end pipeline tests against scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use code_assist::config::AssistConfig;
use code_assist::error::LlmError;
use code_assist::llm::{
    AutomationOutcome, ChatMessage, ChatStream, EventStream, Role, StreamEvent, ToolAutomation,
    ToolInvocation,
};
use code_assist::retrieval::{ContextIndex, FileIndex, NullContextIndex};
use code_assist::session::Session;
use code_assist::supervisor::{Supervisor, SupervisorDeps};

fn discard(_: &str) {}

fn content(text: &str) -> StreamEvent {
    StreamEvent::Content(text.to_string())
}

/// Serves one scripted event stream per call and records every prompt.
struct ScriptedChat {
    scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedChat {
    fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call(&self, index: usize) -> (String, Vec<ChatMessage>) {
        self.calls.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatStream for ScriptedChat {
    async fn start_stream(
        &self,
        instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((instructions.to_string(), messages));
        let events = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Returns a fixed automation outcome and records the transcript it saw.
struct ScriptedAutomation {
    outcome: AutomationOutcome,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedAutomation {
    fn new(outcome: AutomationOutcome) -> Self {
        Self {
            outcome,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolAutomation for ScriptedAutomation {
    async fn run(
        &self,
        _instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<AutomationOutcome, LlmError> {
        self.seen.lock().unwrap().push(messages);
        Ok(self.outcome.clone())
    }
}

fn build(
    chat: Arc<ScriptedChat>,
    automation: Arc<ScriptedAutomation>,
    index: Arc<dyn ContextIndex>,
) -> Supervisor {
    Supervisor::new(
        AssistConfig::default(),
        SupervisorDeps {
            chat,
            automation,
            index,
        },
    )
}

fn no_automation() -> Arc<ScriptedAutomation> {
    Arc::new(ScriptedAutomation::new(AutomationOutcome::default()))
}

#[tokio::test]
async fn generator_turn_streams_content_and_tool_output() {
    let chat = Arc::new(ScriptedChat::new(vec![
        vec![
            content("This needs new code.\nFinal decision: code_generator"),
            StreamEvent::Done,
        ],
        vec![
            content("fn reverse(s: &str) -> String { s.chars().rev().collect() }\n"),
            StreamEvent::ToolOutput("3\n".to_string()),
            StreamEvent::Done,
        ],
    ]));
    let sup = build(Arc::clone(&chat), no_automation(), Arc::new(NullContextIndex));

    let mut session = Session::new();
    let answer = sup
        .handle_query(
            &mut session,
            "write a function to reverse a string",
            &discard,
        )
        .await
        .unwrap();

    // Content and labeled tool output, in emission order.
    let code_pos = answer.find("fn reverse").unwrap();
    let tool_pos = answer.find("# Tool output").unwrap();
    assert!(code_pos < tool_pos);
    assert!(answer.contains("3\n"));

    // One user turn and one assistant turn were logged.
    assert_eq!(session.turns().len(), 2);
    assert_eq!(session.turns()[1].content, answer);
}

#[tokio::test]
async fn explainer_turn_streams_incrementally() {
    let chat = Arc::new(ScriptedChat::new(vec![
        vec![content("code_explainer"), StreamEvent::Done],
        vec![
            content("This function "),
            content("reverses a string."),
            StreamEvent::Done,
        ],
    ]));
    let sup = build(Arc::clone(&chat), no_automation(), Arc::new(NullContextIndex));

    let partials = Mutex::new(Vec::new());
    let on_partial = |text: &str| partials.lock().unwrap().push(text.to_string());

    let mut session = Session::new();
    let answer = sup
        .handle_query(&mut session, "what does reverse do?", &on_partial)
        .await
        .unwrap();

    assert_eq!(answer, "This function reverses a string.");
    // Routing transcript partials, then the growing explanation.
    let partials = partials.lock().unwrap();
    assert!(partials.contains(&"This function ".to_string()));
    assert!(partials.contains(&"This function reverses a string.".to_string()));
}

#[tokio::test]
async fn repository_turn_sees_full_session_transcript() {
    let chat = Arc::new(ScriptedChat::new(vec![vec![
        content("repository_agent"),
        StreamEvent::Done,
    ]]));
    let automation = Arc::new(ScriptedAutomation::new(AutomationOutcome {
        final_text: "Closed issue #7.".to_string(),
        tool_calls: vec![ToolInvocation {
            name: "close_issue".to_string(),
            arguments: r#"{"number":7}"#.to_string(),
        }],
    }));
    let sup = build(
        Arc::clone(&chat),
        Arc::clone(&automation),
        Arc::new(NullContextIndex),
    );

    let mut session = Session::new();
    session.push_user("open an issue about the parser bug");
    session.push_assistant("Opened issue #7.");

    let answer = sup
        .handle_query(&mut session, "now close it", &discard)
        .await
        .unwrap();

    // Tool line precedes the final text.
    assert!(answer.find("close_issue").unwrap() < answer.find("Closed issue #7.").unwrap());

    // The automation backend received the prior turns plus the current query.
    let seen = automation.seen.lock().unwrap();
    let transcript = &seen[0];
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[1].role, Role::Assistant);
    assert_eq!(transcript[2].content, "now close it");
}

#[tokio::test]
async fn retrieved_context_lands_in_handler_prompt() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("shapes.rs"),
        "pub struct Circle { radius: f64 }",
    )
    .unwrap();

    let chat = Arc::new(ScriptedChat::new(vec![
        vec![content("code_explainer"), StreamEvent::Done],
        vec![content("Circle holds a radius."), StreamEvent::Done],
    ]));
    let sup = build(
        Arc::clone(&chat),
        no_automation(),
        Arc::new(FileIndex::new(dir.path().to_path_buf())),
    );

    let mut session = Session::new();
    sup.handle_query(&mut session, "explain the Circle struct", &discard)
        .await
        .unwrap();

    // Second call is the explainer; its prompt carries the snippet.
    let (_, messages) = chat.call(1);
    assert!(messages[0].content.contains("## File 1: shapes.rs"));
    assert!(messages[0].content.contains("pub struct Circle"));
}

#[tokio::test]
async fn classification_failure_defaults_to_generator() {
    let chat = Arc::new(ScriptedChat::new(vec![
        // Transcript mentions no destination at all.
        vec![content("Hmm, unclear."), StreamEvent::Done],
        vec![content("default-generated"), StreamEvent::Done],
    ]));
    let sup = build(Arc::clone(&chat), no_automation(), Arc::new(NullContextIndex));

    let mut session = Session::new();
    let answer = sup
        .handle_query(&mut session, "???", &discard)
        .await
        .unwrap();
    assert_eq!(answer, "default-generated");
    // Exactly two upstream calls: one classification, one handler.
    assert_eq!(chat.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn upstream_error_becomes_error_turn_without_partial_content() {
    let chat = Arc::new(ScriptedChat::new(vec![
        vec![content("code_explainer"), StreamEvent::Done],
        vec![StreamEvent::Error("ConnectionReset".to_string())],
    ]));
    let sup = build(Arc::clone(&chat), no_automation(), Arc::new(NullContextIndex));

    let mut session = Session::new();
    let answer = sup
        .handle_query(&mut session, "explain this", &discard)
        .await
        .unwrap();

    assert!(answer.contains("ConnectionReset"));
    assert!(answer.starts_with("Error:"));
    // The turn is recorded as completed, with the error text as content.
    assert_eq!(session.turns().len(), 2);
}
