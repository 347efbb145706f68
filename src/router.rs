//! Supervisor routing — classifies a query into one destination.
//!
//! The router streams a fixed classification instruction to the LLM,
//! surfaces the growing decision transcript incrementally, then hands
//! the transcript to a `Classifier`. The free-text keyword scan is
//! deliberately fragile (string containment, last-line-first) and kept
//! behind the trait so a structured-output contract can replace it
//! without touching the orchestrator.

use std::sync::Arc;

use futures::StreamExt;

use crate::error::{ClassificationError, Error};
use crate::llm::{ChatMessage, ChatStream, StreamEvent};
use crate::stream::OnPartial;

/// One of the three fixed handlers a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    CodeGenerator,
    CodeExplainer,
    RepositoryAgent,
}

impl Destination {
    /// Scan order for keyword matching within a single line.
    pub const ALL: [Destination; 3] = [
        Destination::CodeExplainer,
        Destination::CodeGenerator,
        Destination::RepositoryAgent,
    ];

    /// Fallback when classification fails.
    pub const DEFAULT: Destination = Destination::CodeGenerator;

    /// The keyword the model is instructed to answer with.
    pub fn keyword(&self) -> &'static str {
        match self {
            Destination::CodeGenerator => "code_generator",
            Destination::CodeExplainer => "code_explainer",
            Destination::RepositoryAgent => "repository_agent",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Destination::CodeGenerator => "for generating code",
            Destination::CodeExplainer => "for explaining code",
            Destination::RepositoryAgent => {
                "for handling repository tasks, issues, and pull requests"
            }
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Extracts a routing decision from a classification transcript.
pub trait Classifier: Send + Sync {
    fn classify(&self, transcript: &str) -> Result<Destination, ClassificationError>;
}

/// Case-insensitive keyword scan, last line first.
///
/// The model is told to give reasoning followed by a final decision
/// line; scanning backward prioritizes the concluding statement over
/// earlier discussion that may mention other destinations.
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, transcript: &str) -> Result<Destination, ClassificationError> {
        let lines: Vec<&str> = transcript.trim().lines().collect();
        for line in lines.iter().rev() {
            let line = line.to_lowercase();
            for destination in Destination::ALL {
                if line.contains(destination.keyword()) {
                    return Ok(destination);
                }
            }
        }
        Err(ClassificationError::NoDecision { lines: lines.len() })
    }
}

/// Routes a query by streaming a classification call and scanning the
/// accumulated transcript.
pub struct Router {
    chat: Arc<dyn ChatStream>,
    classifier: Box<dyn Classifier>,
}

impl Router {
    pub fn new(chat: Arc<dyn ChatStream>) -> Self {
        Self {
            chat,
            classifier: Box::new(KeywordClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn instructions() -> String {
        let mut out = String::from("You are a supervisor managing three agents:\n");
        for destination in Destination::ALL {
            out.push_str(&format!(
                "- {}: {}.\n",
                destination.keyword(),
                destination.describe()
            ));
        }
        out.push_str(
            "Decide which agent should handle the user query. \
             Provide a brief reasoning and then a final decision line \
             containing only the agent name.",
        );
        out
    }

    /// Classify `query` into a destination.
    ///
    /// The decision transcript is surfaced through `on_partial` as it
    /// accumulates. No retry: a transcript with no keyword is a
    /// `ClassificationError` for the caller to substitute the default.
    pub async fn route(&self, query: &str, on_partial: OnPartial<'_>) -> Result<Destination, Error> {
        let messages = vec![ChatMessage::user(format!("User query: {}", query))];
        let stream = self.chat.start_stream(&Self::instructions(), messages).await;

        let mut transcript = String::new();
        match stream {
            Ok(mut stream) => {
                while let Some(event) = stream.next().await {
                    match event {
                        StreamEvent::Content(text) => {
                            transcript.push_str(&text);
                            on_partial(&transcript);
                        }
                        // Classification never executes tools.
                        StreamEvent::ToolOutput(_) => {}
                        StreamEvent::Error(message) => {
                            tracing::warn!("Classification stream failed: {}", message);
                            break;
                        }
                        StreamEvent::Done => break,
                    }
                }
            }
            Err(e) => {
                // An empty transcript classifies as NoDecision, which the
                // caller resolves to the default destination.
                tracing::warn!("Classification call failed to start: {}", e);
            }
        }

        let destination = self.classifier.classify(&transcript)?;
        tracing::debug!(%destination, "Routing decision");
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::EventStream;
    use crate::stream::discard_partials;

    struct ScriptedChat {
        events: Mutex<Option<Vec<StreamEvent>>>,
    }

    impl ScriptedChat {
        fn new(events: Vec<StreamEvent>) -> Self {
            Self {
                events: Mutex::new(Some(events)),
            }
        }
    }

    #[async_trait]
    impl ChatStream for ScriptedChat {
        async fn start_stream(
            &self,
            _instructions: &str,
            _messages: Vec<ChatMessage>,
        ) -> Result<EventStream, LlmError> {
            let events = self.events.lock().unwrap().take().unwrap_or_default();
            Ok(Box::pin(tokio_stream::iter(events)))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn classify_final_decision_line() {
        let transcript = "The user wants code written.\nFinal decision: code_generator";
        let result = KeywordClassifier.classify(transcript).unwrap();
        assert_eq!(result, Destination::CodeGenerator);
    }

    #[test]
    fn classify_prefers_last_matching_line() {
        // Earlier discussion mentions another destination; the concluding
        // line wins because the scan runs backward.
        let transcript = "code_explainer could work here, but...\n\
                          Actually this is a repository task.\n\
                          repository_agent";
        let result = KeywordClassifier.classify(transcript).unwrap();
        assert_eq!(result, Destination::RepositoryAgent);
    }

    #[test]
    fn classify_is_case_insensitive() {
        let result = KeywordClassifier.classify("Decision: CODE_EXPLAINER").unwrap();
        assert_eq!(result, Destination::CodeExplainer);
    }

    #[test]
    fn classify_skips_trailing_non_matching_lines() {
        let transcript = "Use code_explainer for this.\nHope that helps!";
        let result = KeywordClassifier.classify(transcript).unwrap();
        assert_eq!(result, Destination::CodeExplainer);
    }

    #[test]
    fn classify_no_keyword_is_error() {
        let result = KeywordClassifier.classify("I have no idea.");
        assert!(matches!(
            result,
            Err(ClassificationError::NoDecision { lines: 1 })
        ));
    }

    #[test]
    fn classify_empty_transcript_is_error() {
        assert!(KeywordClassifier.classify("").is_err());
    }

    #[tokio::test]
    async fn route_accumulates_streamed_transcript() {
        let chat = Arc::new(ScriptedChat::new(vec![
            StreamEvent::Content("Reasoning: generate code.\n".to_string()),
            StreamEvent::Content("code_gene".to_string()),
            StreamEvent::Content("rator".to_string()),
            StreamEvent::Done,
        ]));
        let router = Router::new(chat);
        let destination = router.route("write a function", &discard_partials).await.unwrap();
        assert_eq!(destination, Destination::CodeGenerator);
    }

    #[tokio::test]
    async fn route_surfaces_growing_transcript() {
        let calls = Mutex::new(Vec::new());
        let on_partial = |text: &str| calls.lock().unwrap().push(text.to_string());

        let chat = Arc::new(ScriptedChat::new(vec![
            StreamEvent::Content("ab".to_string()),
            StreamEvent::Content("cd".to_string()),
            StreamEvent::Done,
        ]));
        Router::new(chat).route("q", &on_partial).await.ok();
        assert_eq!(calls.lock().unwrap().as_slice(), ["ab", "abcd"]);
    }

    #[tokio::test]
    async fn route_uses_replacement_classifier() {
        struct FixedClassifier(Destination);

        impl Classifier for FixedClassifier {
            fn classify(&self, _transcript: &str) -> Result<Destination, ClassificationError> {
                Ok(self.0)
            }
        }

        // The transcript says generator, but the installed classifier
        // has the final word.
        let chat = Arc::new(ScriptedChat::new(vec![
            StreamEvent::Content("code_generator".to_string()),
            StreamEvent::Done,
        ]));
        let router = Router::new(chat)
            .with_classifier(Box::new(FixedClassifier(Destination::RepositoryAgent)));
        let destination = router.route("q", &discard_partials).await.unwrap();
        assert_eq!(destination, Destination::RepositoryAgent);
    }

    #[tokio::test]
    async fn route_stream_error_yields_no_decision() {
        let chat = Arc::new(ScriptedChat::new(vec![StreamEvent::Error(
            "boom".to_string(),
        )]));
        let result = Router::new(chat).route("q", &discard_partials).await;
        assert!(matches!(result, Err(Error::Classification(_))));
    }
}
