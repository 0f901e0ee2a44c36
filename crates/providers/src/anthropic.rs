//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wikiagent_config::ProviderConfig;
use wikiagent_core::error::{BackendError, ProtocolError, ProviderError};
use wikiagent_core::message::{Message, Role};
use wikiagent_core::provider::{BackendResponse, Provider, Usage};
use wikiagent_core::tool::{ToolArguments, ToolCall, ToolDefinition};

use crate::catalog::{ToolCatalog, display_name};
use crate::http;

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    catalog: ToolCatalog,
}

impl AnthropicProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::NotConfigured(format!("provider '{}' needs an api_key", config.name)))?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: http::build_client(config.timeout_secs)?,
            catalog: ToolCatalog::new(),
        })
    }

    /// Extract system messages from the context.
    /// Anthropic puts the system prompt in a top-level field, not in messages.
    fn extract_system(context: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in context {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert messages plus the user turn to content-block form.
    ///
    /// Consecutive tool results are merged into one user turn so every
    /// `tool_use` is answered in the message that follows it.
    fn to_api_messages(messages: &[&Message], user_text: &str) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => result.push(AnthropicMessage::text("user", &msg.content)),
                Role::Assistant => {
                    let mut blocks: Vec<ContentBlock> = Vec::new();
                    if !msg.content.trim().is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.arguments.to_value(),
                        });
                    }
                    if !blocks.is_empty() {
                        result.push(AnthropicMessage {
                            role: "assistant".into(),
                            content: blocks,
                        });
                    }
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    };
                    match result.last_mut() {
                        Some(last) if last.role == "user" && last.is_tool_results() => {
                            last.content.push(block)
                        }
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: vec![block],
                        }),
                    }
                }
                Role::System => {}
            }
        }

        result.push(AnthropicMessage::text("user", user_text));
        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.json_schema(),
            })
            .collect()
    }

    fn build_body(&self, user_text: &str, context: &[Message]) -> serde_json::Value {
        let (system, messages) = Self::extract_system(context);
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&messages, user_text),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        let tools = self.catalog.snapshot();
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&tools));
        }
        body
    }

    fn parse_response(body: &str) -> Result<BackendResponse, ProtocolError> {
        let api: AnthropicResponse = http::decode(PROVIDER, body)?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        for block in api.content {
            match block {
                ResponseContentBlock::Text { text } => text_parts.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, ToolArguments::from_value(input)))
                }
                ResponseContentBlock::Other => {}
            }
        }

        let stop_reason = api.stop_reason.unwrap_or_else(|| "end_turn".into());
        let done = stop_reason == "end_turn" || stop_reason == "tool_use";

        let mut metadata = serde_json::Map::new();
        metadata.insert("stop_reason".into(), stop_reason.into());
        if let Some(model) = api.model {
            metadata.insert("model".into(), model.into());
        }

        Ok(BackendResponse {
            content: if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join("\n"))
            },
            tool_calls,
            done,
            usage: api.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
            metadata,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn register_tool(&self, definition: ToolDefinition) {
        self.catalog.register(definition);
    }

    fn registered_tools(&self) -> Vec<ToolDefinition> {
        self.catalog.snapshot()
    }

    async fn send_message(
        &self,
        user_text: &str,
        context: &[Message],
        cancel: &CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(user_text, context);

        debug!(provider = %self.name, model = %self.model, "Sending messages request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let text = http::post_json(PROVIDER, request, &body, cancel).await?;
        Ok(Self::parse_response(&text)?)
    }

    fn provider_name(&self) -> String {
        display_name(&self.name, &self.model, self.catalog.len())
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

impl AnthropicMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    fn is_tool_results(&self) -> bool {
        self.content
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
