//! Provider trait: the port between the ReAct engine and a model backend.
//!
//! A Provider performs exactly one request/response round trip per
//! [`Provider::send_message`] call and normalizes whatever the backend
//! returned into a [`BackendResponse`]. Adapters own wire marshalling only;
//! loop and termination logic live in the agent crate.
//!
//! Implementations: Ollama, OpenAI-compatible (OpenAI, LM Studio), Anthropic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition};

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// The normalized shape every adapter produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Generated text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls in the order the backend returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Whether the backend considers its turn finished
    #[serde(default)]
    pub done: bool,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Provider-specific metadata (model, stop reason, ...)
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BackendResponse {
    /// A finished, tool-free text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: true,
            ..Self::default()
        }
    }

    /// A response requesting tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The content, or `None` when absent or whitespace-only.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// The backend port.
///
/// Tool registration is interior-mutable so one shared `Arc<dyn Provider>`
/// can be configured after construction.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Register one tool. Re-registering a known name is a no-op.
    fn register_tool(&self, definition: ToolDefinition);

    /// Register several tools, each idempotently.
    fn register_tools(&self, definitions: Vec<ToolDefinition>) {
        for definition in definitions {
            self.register_tool(definition);
        }
    }

    /// Snapshot of every registered tool, in registration order.
    fn registered_tools(&self) -> Vec<ToolDefinition>;

    /// One round trip: send `context` followed by `user_text` as the final
    /// user turn. `context` is never modified. The call aborts with
    /// `ProviderError::Cancelled` once `cancel` fires.
    async fn send_message(
        &self,
        user_text: &str,
        context: &[Message],
        cancel: &CancellationToken,
    ) -> std::result::Result<BackendResponse, BackendError>;

    /// Diagnostic identity, e.g. `"Ollama (llama3.1) [Tools: 3]"`.
    fn provider_name(&self) -> String;
}
