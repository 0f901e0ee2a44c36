//! Tool domain: definitions, calls, typed arguments, handlers, and the registry.
//!
//! A [`ToolHandler`] owns one or more tool names and declares them through
//! [`ToolHandler::tool_definitions`]. The [`ToolRegistry`] indexes every
//! declared name to its handler and is the single dispatch boundary: a
//! missing handler or a handler error becomes an observation string, never
//! an error for the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::memory::MessageLog;

// ── Arguments ─────────────────────────────────────────────────────────────

/// Structured tool arguments, independent of any backend's wire format.
///
/// Keys are kept in sorted order, so [`canonical`](Self::canonical) is stable
/// for equal argument sets regardless of how the backend ordered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(serde_json::Map<String, serde_json::Value>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse arguments from JSON text.
    ///
    /// Accepts an object, or a string that itself contains an object (some
    /// backends double-encode). Anything else yields empty arguments.
    pub fn from_json_str(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                debug!(error = %e, "Unparsable tool arguments, using empty set");
                Self::default()
            }
        }
    }

    /// Build arguments from a JSON value (object or JSON-in-a-string).
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            serde_json::Value::String(inner) => match serde_json::from_str(&inner) {
                Ok(serde_json::Value::Object(map)) => Self(map),
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    /// Insert a value, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// A string argument. Non-string values are not coerced.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(|v| v.as_str()).map(String::from)
    }

    /// A string argument, or `default` when absent, non-string or blank.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        match self.get_string(key) {
            Some(s) if !s.trim().is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// An integer argument. Numeric strings such as `"10"` are accepted.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A float argument. Numeric strings are accepted.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A boolean argument. `"true"`/`"false"` strings are accepted.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Compact JSON text with sorted keys. Equal argument sets always
    /// produce equal text.
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".into())
    }

    /// The arguments as a JSON object value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }
}

impl From<serde_json::Value> for ToolArguments {
    fn from(value: serde_json::Value) -> Self {
        Self::from_value(value)
    }
}

// ── Definitions ───────────────────────────────────────────────────────────

/// JSON Schema type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One named, typed parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            enum_values: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A tool definition sent to the backend so the model knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// What the tool does (sent to the model)
    pub description: String,

    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter, returning `self` for chaining.
    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render the parameters as a JSON Schema object.
    pub fn json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for p in &self.parameters {
            let mut prop = serde_json::json!({
                "type": p.kind.as_str(),
                "description": p.description,
            });
            if let Some(values) = &p.enum_values {
                prop["enum"] = serde_json::json!(values);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ── Calls and results ─────────────────────────────────────────────────────

/// A request from the model to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates this call with its later tool-result message
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// `(tool name, canonical argument text)`; two calls with equal
    /// signatures are duplicates.
    pub fn signature(&self) -> (String, String) {
        (self.name.clone(), self.arguments.canonical())
    }
}

/// The outcome of dispatching one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether a handler ran and returned normally
    pub success: bool,

    /// The observation text fed back to the model
    pub output: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// A component that executes one or more named tools.
///
/// Single-tool handlers return a one-element list from
/// [`tool_definitions`](Self::tool_definitions).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Every tool this handler answers for.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute `tool_name` with `arguments`. The log handle lets handlers
    /// record their own traces in module logs.
    async fn execute(
        &self,
        tool_name: &str,
        arguments: &ToolArguments,
        log: &MessageLog,
    ) -> std::result::Result<String, ToolError>;
}

/// Maps tool names to the handler responsible for them.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of handlers.
    pub fn from_handlers<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ToolHandler>>,
    {
        let mut registry = Self::new();
        for handler in handlers {
            registry.register(handler);
        }
        registry
    }

    /// Register every tool a handler exposes. A name registered twice is
    /// re-pointed at the newer handler; its definition is replaced in place.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        for def in handler.tool_definitions() {
            if self.handlers.insert(def.name.clone(), handler.clone()).is_some() {
                warn!(tool = %def.name, "Tool registered twice, later handler wins");
                if let Some(existing) = self.definitions.iter_mut().find(|d| d.name == def.name) {
                    *existing = def;
                }
            } else {
                self.definitions.push(def);
            }
        }
    }

    /// Get the handler for a tool name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// All registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Execute a tool call. Never fails: a missing handler or a handler
    /// error is described in the returned observation.
    pub async fn dispatch(&self, call: &ToolCall, log: &MessageLog) -> ToolResult {
        let Some(handler) = self.handlers.get(&call.name) else {
            warn!(tool = %call.name, "No handler registered for tool");
            return ToolResult {
                call_id: call.id.clone(),
                success: false,
                output: format!("Warning: no handler registered for tool '{}'", call.name),
            };
        };

        match handler.execute(&call.name, &call.arguments, log).await {
            Ok(output) => ToolResult {
                call_id: call.id.clone(),
                success: true,
                output,
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult {
                    call_id: call.id.clone(),
                    success: false,
                    output: format!("Error executing {}: {e}", call.name),
                }
            }
        }
    }
}
