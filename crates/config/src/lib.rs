//! Configuration loading, validation, and management for WikiAgent.
//!
//! Loads configuration from `~/.wikiagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.wikiagent/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the `[[providers]]` entry to use
    #[serde(default = "default_active_provider")]
    pub active_provider: String,

    /// Verbose diagnostics in the CLI
    #[serde(default)]
    pub debug: bool,

    /// ReAct loop settings
    #[serde(default)]
    pub agent: ReactSettings,

    /// Model backends
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Tool handler settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_active_provider() -> String {
    "ollama-local".into()
}
fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::new(
        default_active_provider(),
        ProviderKind::Ollama,
        "llama3.1",
    )]
}
fn default_true() -> bool {
    true
}

/// Settings consumed by the ReAct engine and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactSettings {
    /// Hard ceiling on rounds per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Use the engine instead of a single backend call
    #[serde(default = "default_true")]
    pub enable_react_pattern: bool,

    /// Keep looping after the first round of tool results
    #[serde(default = "default_true")]
    pub enable_multi_tool_loop: bool,

    #[serde(default = "default_true")]
    pub prevent_duplicate_tool_calls: bool,

    /// Consecutive identical calls that trip the loop breaker
    #[serde(default = "default_max_consecutive_duplicates")]
    pub max_consecutive_duplicates: usize,

    /// Spend the last round on a tool-free answer
    #[serde(default = "default_true")]
    pub reserve_last_iteration_for_final_answer: bool,

    /// Remaining-rounds count at which the model is warned
    #[serde(default = "default_iteration_warning_threshold")]
    pub iteration_warning_threshold: usize,

    /// Observability only; never affects termination
    #[serde(default = "default_true")]
    pub show_intermediate_steps: bool,
}

fn default_max_iterations() -> usize {
    10
}
fn default_max_consecutive_duplicates() -> usize {
    2
}
fn default_iteration_warning_threshold() -> usize {
    2
}

impl Default for ReactSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            enable_react_pattern: true,
            enable_multi_tool_loop: true,
            prevent_duplicate_tool_calls: true,
            max_consecutive_duplicates: default_max_consecutive_duplicates(),
            reserve_last_iteration_for_final_answer: true,
            iteration_warning_threshold: default_iteration_warning_threshold(),
            show_intermediate_steps: true,
        }
    }
}

impl ReactSettings {
    /// Whether the orchestrator should run the full engine.
    pub fn react_mode(&self) -> bool {
        self.enable_react_pattern && self.enable_multi_tool_loop
    }
}

/// Which wire protocol a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenaiCompat,
    LmStudio,
    Anthropic,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenaiCompat => "https://api.openai.com",
            Self::LmStudio => "http://localhost:1234",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Whether requests are rejected without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Anthropic)
    }
}

/// One model backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique name referenced by `active_provider`
    pub name: String,

    pub kind: ProviderKind,

    /// Defaults per kind when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    300
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: None,
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }

    /// The configured base URL, or the kind's default, without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Tool handler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory searched by `search_documents`; the tool is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<PathBuf>,

    /// Working copy or URL queried by `svn_operation`; disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn_repository: Option<String>,

    /// Default Wikipedia language edition
    #[serde(default = "default_wikipedia_language")]
    pub wikipedia_language: String,

    /// Per-request timeout for tool HTTP calls
    #[serde(default = "default_tool_timeout_secs")]
    pub http_timeout_secs: u64,

    /// PostgreSQL URL explored by `explore_database_schema`; disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Per-query timeout for schema exploration
    #[serde(default = "default_tool_timeout_secs")]
    pub database_timeout_secs: u64,
}

fn default_wikipedia_language() -> String {
    "es".into()
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            documents_dir: None,
            svn_repository: None,
            wikipedia_language: default_wikipedia_language(),
            http_timeout_secs: default_tool_timeout_secs(),
            database_url: None,
            database_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.wikiagent/config.toml).
    ///
    /// Environment overrides, applied after the file:
    /// - `WIKIAGENT_PROVIDER` selects the active provider
    /// - `WIKIAGENT_MODEL` replaces the active provider's model
    /// - `WIKIAGENT_API_KEY` fills the active provider's key when none is set
    /// - `WIKIAGENT_DATABASE_URL` replaces `tools.database_url`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_overrides(&config_path, |key| std::env::var(key).ok())
    }

    /// Load `path`, apply overrides from `lookup`, then validate once.
    pub fn load_with_overrides<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a specific file path. Not validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply overrides from a variable lookup. `load()` passes the process
    /// environment; tests pass a closure.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WIKIAGENT_DATABASE_URL").filter(|v| !v.is_empty()) {
            self.tools.database_url = Some(url);
        }
        if let Some(provider) = lookup("WIKIAGENT_PROVIDER").filter(|v| !v.is_empty()) {
            self.active_provider = provider;
        }
        let active = self.active_provider.clone();
        let Some(provider) = self.providers.iter_mut().find(|p| p.name == active) else {
            return;
        };
        if let Some(model) = lookup("WIKIAGENT_MODEL").filter(|v| !v.is_empty()) {
            provider.model = model;
        }
        if provider.api_key.is_none() {
            provider.api_key = lookup("WIKIAGENT_API_KEY").filter(|v| !v.is_empty());
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wikiagent")
    }

    /// The provider named by `active_provider`.
    pub fn active_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.providers
            .iter()
            .find(|p| p.name == self.active_provider)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "active_provider '{}' is not configured",
                    self.active_provider
                ))
            })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.max_consecutive_duplicates == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_consecutive_duplicates must be at least 1".into(),
            ));
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if provider.temperature < 0.0 || provider.temperature > 2.0 {
                return Err(ConfigError::ValidationError(format!(
                    "provider '{}': temperature must be between 0.0 and 2.0",
                    provider.name
                )));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(ConfigError::ValidationError(format!(
                    "provider '{}' is defined more than once",
                    provider.name
                )));
            }
        }

        if let Some(url) = &self.tools.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(ConfigError::ValidationError(
                    "tools.database_url must be a postgres:// or postgresql:// URL".into(),
                ));
            }
        }

        self.active_provider()?;
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_provider: default_active_provider(),
            debug: false,
            agent: ReactSettings::default(),
            providers: default_providers(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for wikiagent_core::Error {
    fn from(e: ConfigError) -> Self {
        wikiagent_core::Error::Config { message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.active_provider, "ollama-local");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.max_consecutive_duplicates, 2);
        assert_eq!(config.agent.iteration_warning_threshold, 2);
        assert!(config.agent.reserve_last_iteration_for_final_answer);
        assert!(config.agent.react_mode());
        assert_eq!(config.tools.wikipedia_language, "es");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.active_provider, config.active_provider);
        assert_eq!(parsed.agent, config.agent);
        assert_eq!(parsed.providers.len(), 1);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
active_provider = "claude"

[agent]
max_iterations = 5
enable_multi_tool_loop = false

[[providers]]
name = "claude"
kind = "anthropic"
model = "claude-sonnet-4"
api_key = "sk-test"

[tools]
documents_dir = "docs"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.max_iterations, 5);
        assert!(!config.agent.react_mode());
        assert_eq!(config.agent.max_consecutive_duplicates, 2);

        let provider = config.active_provider().unwrap();
        assert_eq!(provider.kind, ProviderKind::Anthropic);
        assert_eq!(provider.resolved_base_url(), "https://api.anthropic.com");
        assert_eq!(provider.max_tokens, 2000);
        assert_eq!(config.tools.documents_dir.as_deref(), Some(Path::new("docs")));
        assert_eq!(config.tools.wikipedia_language, "es");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.providers[0].temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_active_provider_rejected() {
        let config = AppConfig {
            active_provider: "missing".into(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn duplicate_provider_names_rejected() {
        let mut config = AppConfig::default();
        config.providers.push(config.providers[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unparsable_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent = [not valid").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().active_provider, "ollama-local");
    }

    #[test]
    fn env_overrides_target_active_provider() {
        let mut config = AppConfig::default();
        config
            .providers
            .push(ProviderConfig::new("studio", ProviderKind::LmStudio, "qwen2.5"));

        let env: HashMap<&str, &str> = [
            ("WIKIAGENT_PROVIDER", "studio"),
            ("WIKIAGENT_MODEL", "mistral-7b"),
            ("WIKIAGENT_API_KEY", "key-123"),
        ]
        .into_iter()
        .collect();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.active_provider, "studio");
        let active = config.active_provider().unwrap();
        assert_eq!(active.model, "mistral-7b");
        assert_eq!(active.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.providers[0].model, "llama3.1");
    }

    #[test]
    fn env_provider_repairs_invalid_active_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "active_provider = \"gone\"").unwrap();

        assert!(AppConfig::load_with_overrides(file.path(), |_| None).is_err());

        let config = AppConfig::load_with_overrides(file.path(), |k| {
            (k == "WIKIAGENT_PROVIDER").then(|| "ollama-local".to_string())
        })
        .unwrap();
        assert_eq!(config.active_provider, "ollama-local");
    }

    #[test]
    fn database_url_must_be_postgres() {
        let mut config = AppConfig::default();
        config.tools.database_url = Some("sqlserver://db.local/app".into());
        assert!(config.validate().is_err());

        config.apply_env_overrides(|k| {
            (k == "WIKIAGENT_DATABASE_URL").then(|| "postgres://reader@db.local/app".to_string())
        });
        assert!(config.validate().is_ok());
        assert_eq!(config.tools.database_url.as_deref(), Some("postgres://reader@db.local/app"));
    }

    #[test]
    fn env_api_key_does_not_replace_configured_key() {
        let mut config = AppConfig::default();
        config.providers[0].api_key = Some("from-file".into());
        config.apply_env_overrides(|k| (k == "WIKIAGENT_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.providers[0].api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut provider = ProviderConfig::new("x", ProviderKind::OpenaiCompat, "gpt-4o");
        provider.api_key = Some("sk-secret".into());
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("ollama-local"));
        assert!(toml_str.contains("max_iterations"));
    }
}
