//! Provider router: builds every configured backend and selects the
//! active one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use wikiagent_config::{AppConfig, ProviderConfig, ProviderKind};
use wikiagent_core::error::ProviderError;
use wikiagent_core::provider::Provider;

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Holds the configured providers by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    active: String,
}

impl ProviderRouter {
    pub fn new(active: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            active: active.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The provider named by `active_provider`.
    pub fn active(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(&self.active).ok_or_else(|| {
            ProviderError::NotConfigured(format!("active provider '{}' could not be built", self.active))
        })
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

/// Build one adapter for a provider entry.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::OpenaiCompat | ProviderKind::LmStudio => {
            Arc::new(OpenAiCompatProvider::from_config(config)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
    };
    Ok(provider)
}

/// Build providers from configuration.
///
/// An entry that cannot be built is skipped with a warning unless it is
/// the active provider, which is an error.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let mut router = ProviderRouter::new(&config.active_provider);

    for provider_config in &config.providers {
        match build_provider(provider_config) {
            Ok(provider) => router.register(provider_config.name.clone(), provider),
            Err(e) if provider_config.name == config.active_provider => return Err(e),
            Err(e) => warn!(provider = %provider_config.name, error = %e, "Skipping provider"),
        }
    }

    let active = router.active()?;
    info!(provider = %active.provider_name(), "Active provider ready");
    Ok(router)
}
