//! Ollama native chat provider.
//!
//! Talks to `/api/chat` with `stream: false`. Ollama returns tool call
//! arguments as JSON objects and does not assign call ids, so ids are
//! generated here.

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

const PROVIDER: &str = "ollama";

/// Ollama `/api/chat` provider.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    catalog: ToolCatalog,
}

impl OllamaProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            name: config.name.clone(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: http::build_client(config.timeout_secs)?,
            catalog: ToolCatalog::new(),
        })
    }

    /// Context followed by the user turn, in Ollama's message shape.
    fn to_api_messages(context: &[Message], user_text: &str) -> Vec<ApiMessage> {
        let mut messages: Vec<ApiMessage> = context
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.to_value(),
                                },
                            })
                            .collect(),
                    )
                },
            })
            .collect();

        messages.push(ApiMessage {
            role: Role::User.as_str().into(),
            content: user_text.to_string(),
            tool_calls: None,
        });
        messages
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema(),
                    }
                })
            })
            .collect()
    }

    fn build_body(&self, user_text: &str, context: &[Message]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(context, user_text),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });

        let tools = self.catalog.snapshot();
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&tools));
        }
        body
    }

    /// Map an `/api/chat` body into the normalized response.
    fn parse_response(body: &str) -> Result<BackendResponse, ProtocolError> {
        let api: ApiResponse = http::decode(PROVIDER, body)?;
        let message = api.message.ok_or_else(|| ProtocolError::MissingField {
            provider: PROVIDER.into(),
            field: "message".into(),
        })?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                ToolCall::new(
                    format!("call_{}", uuid::Uuid::new_v4().simple()),
                    tc.function.name,
                    ToolArguments::from_value(tc.function.arguments),
                )
            })
            .collect();

        let usage = match (api.prompt_eval_count, api.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(Usage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        };

        let mut metadata = serde_json::Map::new();
        if let Some(model) = api.model {
            metadata.insert("model".into(), model.into());
        }
        if let Some(reason) = api.done_reason {
            metadata.insert("done_reason".into(), reason.into());
        }

        Ok(BackendResponse {
            content: Some(message.content),
            tool_calls,
            done: api.done,
            usage,
            metadata,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
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
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_body(user_text, context);

        debug!(provider = %self.name, model = %self.model, messages = context.len() + 1, "Sending chat request");

        let text = http::post_json(PROVIDER, self.client.post(&url), &body, cancel).await?;
        Ok(Self::parse_response(&text)?)
    }

    fn provider_name(&self) -> String {
        display_name(&self.name, &self.model, self.catalog.len())
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikiagent_config::ProviderKind;

    fn provider() -> OllamaProvider {
        OllamaProvider::from_config(&ProviderConfig::new("Ollama-Local", ProviderKind::Ollama, "llama3.1"))
            .unwrap()
    }

    #[test]
    fn user_text_is_last_message() {
        let context = vec![Message::system("Be brief"), Message::assistant("Hi")];
        let messages = OllamaProvider::to_api_messages(&context, "What is Rust?");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content, "What is Rust?");
    }

    #[test]
    fn assistant_tool_calls_carry_object_arguments() {
        let call = ToolCall::new("c1", "search_wikipedia_titles", ToolArguments::new().with("query", "Rust"));
        let context = vec![
            Message::assistant_with_tool_calls("Processing", vec![call]),
            Message::tool_result("c1", "Rust (programming language)"),
        ];
        let messages = OllamaProvider::to_api_messages(&context, "q");
        let calls = messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments["query"], "Rust");
        assert_eq!(messages[1].role, "tool");
    }

    #[test]
    fn body_includes_options_and_registered_tools() {
        let p = provider();
        let body = p.build_body("hello", &[]);
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 2000);
        assert!(body.get("tools").is_none());

        p.register_tool(ToolDefinition::new("lookup", "Look something up"));
        let body = p.build_body("hello", &[]);
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn parse_text_response() {
        let body = r#"{
            "model": "llama3.1",
            "message": {"role": "assistant", "content": "Hello!"},
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 12,
            "eval_count": 3
        }"#;
        let resp = OllamaProvider::parse_response(body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hello!"));
        assert!(resp.done);
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
        assert_eq!(resp.metadata["done_reason"], "stop");
    }

    #[test]
    fn parse_tool_call_response_assigns_ids() {
        let body = r#"{
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "lookup", "arguments": {"a": 1}}},
                    {"function": {"name": "lookup", "arguments": {"a": 2}}}
                ]
            },
            "done": true
        }"#;
        let resp = OllamaProvider::parse_response(body).unwrap();
        assert_eq!(resp.tool_calls.len(), 2);
        assert_eq!(resp.tool_calls[0].arguments.get_int("a"), Some(1));
        assert_ne!(resp.tool_calls[0].id, resp.tool_calls[1].id);
        assert!(resp.usage.is_none());
    }

    #[test]
    fn parse_missing_message_is_protocol_error() {
        let err = OllamaProvider::parse_response(r#"{"done": true}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField { .. }));
        assert!(OllamaProvider::parse_response("not json").is_err());
    }

    #[test]
    fn provider_name_counts_tools() {
        let p = provider();
        p.register_tools(vec![
            ToolDefinition::new("a", "x"),
            ToolDefinition::new("b", "y"),
            ToolDefinition::new("a", "dup"),
        ]);
        assert_eq!(p.provider_name(), "Ollama-Local (llama3.1) [Tools: 2]");
        assert_eq!(p.registered_tools().len(), 2);
    }
}
