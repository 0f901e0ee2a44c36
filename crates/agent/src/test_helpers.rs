//! Shared test helpers for engine and orchestrator tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wikiagent_core::error::{BackendError, ToolError};
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::Message;
use wikiagent_core::provider::{BackendResponse, Provider, Usage};
use wikiagent_core::tool::{ToolArguments, ToolCall, ToolDefinition, ToolHandler};
use wikiagent_core::CancellationToken;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `send_message` returns the next response in the queue and
/// records the context it was given. Panics if more calls are made than
/// responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<BackendResponse, BackendError>>>,
    call_count: Mutex<usize>,
    contexts: Mutex<Vec<Vec<Message>>>,
    tools: Mutex<Vec<ToolDefinition>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<BackendResponse, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            contexts: Mutex::new(Vec::new()),
            tools: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(make_text_response(text))])
    }

    /// A provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<ToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            Ok(make_tool_call_response(tool_calls, thought)),
            Ok(make_text_response(answer)),
        ])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// The context passed to the `index`-th call (0-based).
    pub fn context_of_call(&self, index: usize) -> Vec<Message> {
        self.contexts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn register_tool(&self, definition: ToolDefinition) {
        let mut tools = self.tools.lock().unwrap();
        if !tools.iter().any(|t| t.name == definition.name) {
            tools.push(definition);
        }
    }

    fn registered_tools(&self) -> Vec<ToolDefinition> {
        self.tools.lock().unwrap().clone()
    }

    async fn send_message(
        &self,
        _user_text: &str,
        context: &[Message],
        _cancel: &CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.contexts.lock().unwrap().push(context.to_vec());
        let response = responses[*count].clone();
        *count += 1;
        response
    }

    fn provider_name(&self) -> String {
        "sequential_mock".into()
    }
}

/// A provider whose call never completes.
pub struct PendingProvider;

#[async_trait]
impl Provider for PendingProvider {
    fn register_tool(&self, _definition: ToolDefinition) {}

    fn registered_tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn send_message(
        &self,
        _user_text: &str,
        _context: &[Message],
        _cancel: &CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        std::future::pending().await
    }

    fn provider_name(&self) -> String {
        "pending".into()
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> BackendResponse {
    BackendResponse {
        usage: Some(Usage::new(10, 5)),
        ..BackendResponse::text(text)
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> BackendResponse {
    BackendResponse {
        content: Some(thought.to_string()),
        usage: Some(Usage::new(10, 5)),
        ..BackendResponse::with_tool_calls(tool_calls)
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: ToolArguments) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, args)
}

/// Always returns the same observation.
pub struct StaticHandler {
    name: String,
    output: String,
}

impl StaticHandler {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for StaticHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(&self.name, "Returns a fixed observation")]
    }

    async fn execute(&self, _tool_name: &str, _arguments: &ToolArguments, _log: &MessageLog) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

/// Echoes `"{tool}: {canonical arguments}"`.
pub struct EchoHandler {
    name: String,
}

impl EchoHandler {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ToolHandler for EchoHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(&self.name, "Echoes its arguments")]
    }

    async fn execute(&self, tool_name: &str, arguments: &ToolArguments, _log: &MessageLog) -> Result<String, ToolError> {
        Ok(format!("{tool_name}: {}", arguments.canonical()))
    }
}

/// Always fails.
pub struct FailingHandler {
    name: String,
}

impl FailingHandler {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ToolHandler for FailingHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(&self.name, "Always fails")]
    }

    async fn execute(&self, tool_name: &str, _arguments: &ToolArguments, _log: &MessageLog) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: "boom".into(),
        })
    }
}

/// Counts how often it ran.
pub struct CountingHandler {
    name: String,
    calls: AtomicUsize,
}

impl CountingHandler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandler for CountingHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(&self.name, "Counts invocations")]
    }

    async fn execute(&self, _tool_name: &str, _arguments: &ToolArguments, _log: &MessageLog) -> Result<String, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("call {n}"))
    }
}

/// Cancels the given token when it runs.
pub struct CancellingHandler {
    name: String,
    cancel: CancellationToken,
}

impl CancellingHandler {
    pub fn new(name: &str, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            cancel,
        }
    }
}

#[async_trait]
impl ToolHandler for CancellingHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(&self.name, "Cancels the run")]
    }

    async fn execute(&self, _tool_name: &str, _arguments: &ToolArguments, _log: &MessageLog) -> Result<String, ToolError> {
        self.cancel.cancel();
        Ok("cancelled".into())
    }
}
