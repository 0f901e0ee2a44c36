//! Model backend adapters for WikiAgent.
//!
//! All adapters implement the `wikiagent_core::Provider` port and own only
//! wire marshalling. The router builds the configured backends.

pub mod anthropic;
pub mod catalog;
mod http;
pub mod ollama;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use catalog::ToolCatalog;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, build_provider};
