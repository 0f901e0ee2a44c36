//! Error types for the WikiAgent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the ReAct engine only ever
//! sees [`BackendError`] from a backend round trip and [`ToolError`] from a
//! handler, and folds both into its result instead of propagating them.

use thiserror::Error;

/// The top-level error type for all WikiAgent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level or non-success failures talking to a model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    fn variant(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "ApiError",
            Self::RateLimited { .. } => "RateLimited",
            Self::AuthenticationFailed(_) => "AuthenticationFailed",
            Self::Network(_) => "Network",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::NotConfigured(_) => "NotConfigured",
        }
    }
}

/// The backend answered, but the body could not be mapped into a
/// [`BackendResponse`](crate::provider::BackendResponse).
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Malformed response from {provider}: {reason}")]
    MalformedBody { provider: String, reason: String },

    #[error("Response from {provider} is missing '{field}'")]
    MissingField { provider: String, field: String },
}

impl ProtocolError {
    fn variant(&self) -> &'static str {
        match self {
            Self::MalformedBody { .. } => "MalformedBody",
            Self::MissingField { .. } => "MissingField",
        }
    }
}

/// Anything a single backend round trip can fail with.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BackendError {
    /// Stable classification used as a termination reason, e.g.
    /// `"ProviderError::Network"`.
    pub fn kind(&self) -> String {
        match self {
            Self::Provider(e) => format!("ProviderError::{}", e.variant()),
            Self::Protocol(e) => format!("ProtocolError::{}", e.variant()),
        }
    }

    /// Whether this failure came from a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::Cancelled))
    }
}

/// A tool handler failed. Always recovered into an observation string.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
