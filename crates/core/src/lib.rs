//! # WikiAgent Core
//!
//! Domain types, traits, and error definitions for the WikiAgent ReAct runtime.
//! This crate has no I/O of its own; it defines the model that the provider,
//! tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted providers and stub handlers
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{BackendError, Error, ProtocolError, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus, EventLevel, EventSink, NoopSink, TracingSink};
pub use memory::MessageLog;
pub use message::{Message, Role};
pub use provider::{BackendResponse, Provider, Usage};
pub use tool::{
    ParamKind, ToolArguments, ToolCall, ToolDefinition, ToolHandler, ToolParameter, ToolRegistry,
    ToolResult,
};
pub use tokio_util::sync::CancellationToken;
