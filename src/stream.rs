//! Stream aggregation — folds upstream events into a growing answer.
//!
//! Every destination handler drives its upstream feed through one
//! `StreamAggregator`. The aggregator owns the only incremental-update
//! path: after each event it hands the full buffer to the `OnPartial`
//! callback, in emission order, one refresh per event.

use futures::StreamExt;

use crate::error::LlmError;
use crate::llm::{EventStream, StreamEvent};

/// Incremental-update callback. Receives the full accumulated text so
/// far, zero or more times before the turn resolves.
pub type OnPartial<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// No-op partial handler for callers that don't display progress.
pub fn discard_partials(_: &str) {}

/// Terminal result of one destination invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Stream finished normally; the accumulated text is the answer.
    Completed(String),
    /// Upstream reported an error; the message replaces any partial output.
    Failed(String),
}

impl TurnOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TurnOutcome::Failed(_))
    }
}

/// Folds a sequence of `StreamEvent`s into a final text.
///
/// Consumed by value: one instance serves exactly one invocation.
#[derive(Default)]
pub struct StreamAggregator {
    buffer: String,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a stream-start result to completion.
    ///
    /// An upstream call that failed before emitting anything is turned
    /// into a single synthesized `Error` event, so callers see exactly
    /// one failure channel.
    pub async fn run(
        self,
        stream: Result<EventStream, LlmError>,
        on_partial: OnPartial<'_>,
    ) -> TurnOutcome {
        let stream: EventStream = match stream {
            Ok(s) => s,
            Err(e) => Box::pin(tokio_stream::iter([StreamEvent::Error(e.to_string())])),
        };
        self.consume(stream, on_partial).await
    }

    /// Consume events until a terminal state. No event is processed
    /// after `Error` or `Done`.
    pub async fn consume(mut self, mut stream: EventStream, on_partial: OnPartial<'_>) -> TurnOutcome {
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Content(text) => {
                    self.buffer.push_str(&text);
                    on_partial(&self.buffer);
                }
                StreamEvent::ToolOutput(text) => {
                    self.buffer.push_str("\n# Tool output\n");
                    self.buffer.push_str(&text);
                    on_partial(&self.buffer);
                }
                StreamEvent::Error(message) => return TurnOutcome::Failed(message),
                StreamEvent::Done => break,
            }
        }
        TurnOutcome::Completed(self.buffer)
    }
}
