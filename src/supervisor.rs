//! Orchestrator — one query in, one routed answer out.
//!
//! Pipeline: Supervisor → (route) → exactly one destination handler → End.
//! No retries, no loops back to the router, no cross-destination fallback
//! beyond the single default substitution when classification fails.

use std::sync::Arc;

use crate::agents::{CodeExplainer, CodeGenerator, RepositoryAgent};
use crate::config::AssistConfig;
use crate::error::{Error, LlmError, Result};
use crate::llm::{ChatStream, ToolAutomation};
use crate::retrieval::{ContextIndex, ContextRetriever, ContextSnippet};
use crate::router::{Destination, Router};
use crate::session::Session;
use crate::stream::{OnPartial, TurnOutcome};

/// External collaborators the supervisor depends on.
///
/// Bundles the shared components to reduce argument count.
pub struct SupervisorDeps {
    pub chat: Arc<dyn ChatStream>,
    pub automation: Arc<dyn ToolAutomation>,
    pub index: Arc<dyn ContextIndex>,
}

/// Routes each query to one destination handler and records the turn.
pub struct Supervisor {
    config: AssistConfig,
    router: Router,
    retriever: ContextRetriever,
    generator: CodeGenerator,
    explainer: CodeExplainer,
    repository: RepositoryAgent,
}

impl Supervisor {
    pub fn new(config: AssistConfig, deps: SupervisorDeps) -> Self {
        let retriever = ContextRetriever::new(
            deps.index,
            config.top_k,
            config.use_context_augmentation,
        );
        Self {
            router: Router::new(Arc::clone(&deps.chat)),
            retriever,
            generator: CodeGenerator::new(Arc::clone(&deps.chat)),
            explainer: CodeExplainer::new(deps.chat),
            repository: RepositoryAgent::new(deps.automation),
            config,
        }
    }

    /// Handle one query: route it, run the chosen handler, append the
    /// final answer (or error text) to the session log.
    ///
    /// Exactly one routing decision and one final answer per call. A
    /// failed turn is still recorded as completed, with the error text
    /// as its content.
    pub async fn handle_query(
        &self,
        session: &mut Session,
        query: &str,
        on_partial: OnPartial<'_>,
    ) -> Result<String> {
        let query = query.trim();
        session.push_user(query);

        let timeout = self.config.upstream_timeout;
        let routed = tokio::time::timeout(timeout, self.router.route(query, on_partial)).await;
        let outcome = match routed {
            Err(_) => {
                tracing::warn!(?timeout, "Upstream unresponsive during classification, failing turn");
                TurnOutcome::Failed(LlmError::Unresponsive { after: timeout }.to_string())
            }
            Ok(route_result) => {
                let destination = match route_result {
                    Ok(destination) => destination,
                    Err(Error::Classification(e)) => {
                        tracing::warn!(
                            "Classification failed ({}), falling back to {}",
                            e,
                            Destination::DEFAULT
                        );
                        Destination::DEFAULT
                    }
                    Err(e) => return Err(e),
                };
                tracing::info!(%destination, "Supervisor routed query");
                self.dispatch(session, query, destination, on_partial).await
            }
        };

        let answer = match outcome {
            TurnOutcome::Completed(text) => text,
            TurnOutcome::Failed(message) => format!("Error: {}", message),
        };
        session.push_assistant(&answer);
        Ok(answer)
    }

    /// Invoke exactly one handler, bounded by the upstream timeout.
    async fn dispatch(
        &self,
        session: &Session,
        query: &str,
        destination: Destination,
        on_partial: OnPartial<'_>,
    ) -> TurnOutcome {
        let timeout = self.config.upstream_timeout;
        let turn = async {
            match destination {
                Destination::CodeGenerator => {
                    let context = self.retrieve(query).await;
                    self.generator
                        .respond(query, &context, self.config.snippet_char_budget, on_partial)
                        .await
                }
                Destination::CodeExplainer => {
                    let context = self.retrieve(query).await;
                    self.explainer
                        .respond(query, &context, self.config.snippet_char_budget, on_partial)
                        .await
                }
                Destination::RepositoryAgent => {
                    // The session log already contains the current query.
                    self.repository.respond(session.messages(), on_partial).await
                }
            }
        };

        match tokio::time::timeout(timeout, turn).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(?timeout, "Upstream unresponsive, failing turn");
                TurnOutcome::Failed(LlmError::Unresponsive { after: timeout }.to_string())
            }
        }
    }

    async fn retrieve(&self, query: &str) -> Vec<ContextSnippet> {
        self.retriever.retrieve(query).await
    }
}
