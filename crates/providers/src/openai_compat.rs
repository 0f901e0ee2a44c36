//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, LM Studio, vLLM, and any endpoint exposing
//! `/v1/chat/completions` with function calling.

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

const PROVIDER: &str = "openai_compat";

/// An OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    catalog: ToolCatalog,
}

impl OpenAiCompatProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            name: config.name.clone(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: http::build_client(config.timeout_secs)?,
            catalog: ToolCatalog::new(),
        })
    }

    /// Convert context plus the user turn to OpenAI API format.
    fn to_api_messages(context: &[Message], user_text: &str) -> Vec<ApiMessage> {
        let mut messages: Vec<ApiMessage> = context
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.canonical(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect();

        messages.push(ApiMessage {
            role: Role::User.as_str().into(),
            content: Some(user_text.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });
        messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.json_schema(),
                },
            })
            .collect()
    }

    fn build_body(&self, user_text: &str, context: &[Message]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(context, user_text),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        let tools = self.catalog.snapshot();
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&tools));
        }
        body
    }

    fn parse_response(body: &str) -> Result<BackendResponse, ProtocolError> {
        let api: ApiResponse = http::decode(PROVIDER, body)?;

        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::MissingField {
                provider: PROVIDER.into(),
                field: "choices".into(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, ToolArguments::from_json_str(&tc.function.arguments)))
            .collect();

        let usage = api
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "finish_reason".into(),
            choice.finish_reason.unwrap_or_else(|| "stop".into()).into(),
        );
        if let Some(model) = api.model {
            metadata.insert("model".into(), model.into());
        }

        Ok(BackendResponse {
            content: choice.message.content,
            tool_calls,
            done: true,
            usage,
            metadata,
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
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
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(user_text, context);

        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let text = http::post_json(PROVIDER, request, &body, cancel).await?;
        Ok(Self::parse_response(&text)?)
    }

    fn provider_name(&self) -> String {
        display_name(&self.name, &self.model, self.catalog.len())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
