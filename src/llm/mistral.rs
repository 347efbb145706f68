//! Mistral chat-completions client.
//!
//! Implements both collaborator traits over the same HTTP API: streamed
//! completions (SSE) for `ChatStream`, and a run-to-completion call with
//! tool-call extraction for `ToolAutomation`. Transport failures inside an
//! open stream are folded into a single `Error` event so consumers have
//! one failure channel.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{
    AutomationOutcome, ChatMessage, ChatStream, EventStream, LlmConfig, StreamEvent,
    ToolAutomation, ToolInvocation,
};

const PROVIDER: &str = "mistral";

/// HTTP client for the Mistral chat-completions endpoint.
pub struct MistralClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl MistralClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn build_messages(instructions: &str, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        if !instructions.is_empty() {
            all.push(ChatMessage::system(instructions));
        }
        all.extend(messages);
        all
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            let reason = resp
                .text()
                .await
                .unwrap_or_else(|_| format!("status {}", status));
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason,
            });
        }
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl ChatStream for MistralClient {
    async fn start_stream(
        &self,
        instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream, LlmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: Self::build_messages(instructions, messages),
            stream: true,
        };
        let resp = self.post(&body).await?;
        tracing::debug!(model = %self.config.model, "Opened completion stream");

        let bytes: ByteStream = Box::pin(resp.bytes_stream().map(|r| r.map(|b| b.to_vec())));
        Ok(sse_events(bytes))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait::async_trait]
impl ToolAutomation for MistralClient {
    async fn run(
        &self,
        instructions: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<AutomationOutcome, LlmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: Self::build_messages(instructions, messages),
            stream: false,
        };
        let resp = self.post(&body).await?;
        let parsed: ChatResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response contained no choices".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: match call.function.arguments {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect();

        Ok(AutomationOutcome {
            final_text: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

// ── SSE decoding ────────────────────────────────────────────────────

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

struct SseState {
    bytes: ByteStream,
    buf: String,
    pending: VecDeque<StreamEvent>,
    /// Inner byte stream has ended.
    exhausted: bool,
    /// A terminal event has been yielded; the stream is over.
    terminated: bool,
}

/// Decode an SSE byte stream into `StreamEvent`s.
///
/// Yields at most one terminal event (`Done` or `Error`); a stream that
/// closes without a terminal frame gets a synthesized `Done`.
fn sse_events(bytes: ByteStream) -> EventStream {
    let state = SseState {
        bytes,
        buf: String::new(),
        pending: VecDeque::new(),
        exhausted: false,
        terminated: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if st.terminated {
                return None;
            }
            if let Some(ev) = st.pending.pop_front() {
                if matches!(ev, StreamEvent::Done | StreamEvent::Error(_)) {
                    st.terminated = true;
                }
                return Some((ev, st));
            }
            if st.exhausted {
                // Upstream closed without a terminal frame.
                st.pending.push_back(StreamEvent::Done);
                continue;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buf.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(pos) = st.buf.find('\n') {
                        let line: String = st.buf.drain(..=pos).collect();
                        if let Some(ev) = parse_sse_line(&line) {
                            st.pending.push_back(ev);
                        }
                    }
                }
                Some(Err(e)) => {
                    st.exhausted = true;
                    st.pending
                        .push_back(StreamEvent::Error(format!("stream transport failed: {}", e)));
                }
                None => {
                    st.exhausted = true;
                    let tail = std::mem::take(&mut st.buf);
                    if let Some(ev) = parse_sse_line(&tail) {
                        st.pending.push_back(ev);
                    }
                }
            }
        }
    }))
}

/// Parse one SSE line into an event. Non-data lines and empty deltas
/// yield nothing.
fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next()?;
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                Some(StreamEvent::Content(text))
            } else if choice.finish_reason.is_some() {
                Some(StreamEvent::Done)
            } else {
                None
            }
        }
        Err(e) => Some(StreamEvent::Error(format!("malformed stream payload: {}", e))),
    }
}
