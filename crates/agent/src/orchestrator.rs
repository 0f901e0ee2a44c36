//! Orchestrator: the entry point that turns a user query into an answer.
//!
//! It owns the tool registry, registers every tool with the provider once,
//! and picks between the full ReAct engine and the legacy single-call mode.
//! Either way the global log receives exactly two records per query: the
//! query and the final answer.

use std::sync::Arc;
use tracing::{debug, warn};
use wikiagent_config::ReactSettings;
use wikiagent_core::error::{BackendError, ProviderError};
use wikiagent_core::event::EventSink;
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::{Message, Role};
use wikiagent_core::provider::Provider;
use wikiagent_core::tool::{ToolDefinition, ToolHandler, ToolRegistry};
use wikiagent_core::CancellationToken;

use crate::engine::ReactEngine;
use crate::result::ExecutionResult;
use crate::sanitize::sanitize_context;

const NO_RESPONSE: &str = "No response was received from the model backend.";

/// What one query produced.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: String,
    /// Present when the ReAct engine ran
    pub execution: Option<ExecutionResult>,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    log: MessageLog,
    settings: ReactSettings,
    engine: ReactEngine,
}

impl Orchestrator {
    /// Index the handlers' tools and register them with the provider.
    pub fn new(
        provider: Arc<dyn Provider>,
        handlers: Vec<Arc<dyn ToolHandler>>,
        log: MessageLog,
        settings: ReactSettings,
    ) -> Self {
        let tools = Arc::new(ToolRegistry::from_handlers(handlers));
        provider.register_tools(tools.definitions().to_vec());

        debug!(
            tools = tools.len(),
            provider = %provider.provider_name(),
            react = settings.enable_react_pattern,
            multi_tool_loop = settings.enable_multi_tool_loop,
            "Orchestrator ready"
        );

        let engine = ReactEngine::new(provider.clone(), tools.clone(), log.clone(), settings.clone());
        Self {
            provider,
            tools,
            log,
            settings,
            engine,
        }
    }

    /// Route engine events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.engine = self.engine.with_sink(sink);
        self
    }

    /// Every tool the model can call, in registration order.
    pub fn available_tools(&self) -> &[ToolDefinition] {
        self.tools.definitions()
    }

    pub fn provider_name(&self) -> String {
        self.provider.provider_name()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn settings(&self) -> &ReactSettings {
        &self.settings
    }

    /// Answer `query`; never fails.
    pub async fn process_query(&self, query: &str) -> String {
        self.run_query(query, &CancellationToken::new()).await.answer
    }

    /// Answer `query`, keeping the engine's execution record when there is
    /// one.
    pub async fn run_query(&self, query: &str, cancel: &CancellationToken) -> QueryOutcome {
        // History is taken before the query itself is logged
        let history = self.log.snapshot_global();
        self.log.append_global(Role::User, query);

        let outcome = if self.settings.react_mode() {
            let execution = self.engine.run(query, &history, cancel).await;
            debug!(
                iterations = execution.total_iterations(),
                tool_calls = execution.tool_calls_count(),
                duration_ms = execution.duration_ms,
                "ReAct engine finished"
            );
            QueryOutcome {
                answer: execution.final_answer.clone(),
                execution: Some(execution),
            }
        } else {
            QueryOutcome {
                answer: self.run_legacy(query, history, cancel).await,
                execution: None,
            }
        };

        self.log.append_global(Role::Assistant, outcome.answer.clone());
        outcome
    }

    /// One backend call; a requested tool is dispatched once and its
    /// observation is the answer.
    async fn run_legacy(&self, query: &str, mut history: Vec<Message>, cancel: &CancellationToken) -> String {
        debug!("Using legacy single-call mode");
        sanitize_context(&mut history);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::from(ProviderError::Cancelled)),
            response = self.provider.send_message(query, &history, cancel) => response,
        };

        match response {
            Ok(response) => match response.tool_calls.first() {
                Some(call) => {
                    if response.tool_calls.len() > 1 {
                        debug!(ignored = response.tool_calls.len() - 1, "Legacy mode runs only the first tool call");
                    }
                    self.tools.dispatch(call, &self.log).await.output
                }
                None => response.text_content().unwrap_or(NO_RESPONSE).to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Backend call failed in legacy mode");
                format!("Error contacting the model backend: {e}")
            }
        }
    }
}
