//! Built-in tool handlers for WikiAgent.
//!
//! Handlers give the agent access to Wikipedia, a local document folder,
//! a Subversion repository, and a PostgreSQL catalog. Each handler declares its tools through
//! `ToolHandler::tool_definitions`; the Wikipedia handler answers for two.

pub mod database;
pub mod documents;
pub mod svn;
pub mod wikipedia;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use wikiagent_config::ToolsConfig;
use wikiagent_core::tool::ToolHandler;

pub use database::DatabaseSchemaHandler;
pub use documents::DocumentSearchHandler;
pub use svn::SvnHandler;
pub use wikipedia::WikipediaHandler;

/// Create the handlers enabled by configuration.
///
/// Wikipedia is always present; document search, Subversion and schema
/// exploration are added only when their directory, repository or database
/// is configured. Schema exploration needs a Tokio runtime.
pub fn default_handlers(config: &ToolsConfig) -> Vec<Arc<dyn ToolHandler>> {
    let mut handlers: Vec<Arc<dyn ToolHandler>> = Vec::new();

    match WikipediaHandler::new(&config.wikipedia_language, config.http_timeout_secs) {
        Ok(handler) => handlers.push(Arc::new(handler)),
        Err(e) => warn!(error = %e, "Wikipedia tools unavailable"),
    }

    if let Some(dir) = &config.documents_dir {
        debug!(dir = %dir.display(), "Document search enabled");
        handlers.push(Arc::new(DocumentSearchHandler::new(dir)));
    }

    if let Some(repository) = &config.svn_repository {
        debug!(repository = %repository, "Subversion tool enabled");
        handlers.push(Arc::new(SvnHandler::new(repository)));
    }

    if let Some(url) = &config.database_url {
        let timeout = Duration::from_secs(config.database_timeout_secs);
        match DatabaseSchemaHandler::postgres(url, timeout) {
            Ok(handler) => {
                debug!("Database schema tool enabled");
                handlers.push(Arc::new(handler));
            }
            Err(e) => warn!(error = %e, "Database schema tool unavailable"),
        }
    }

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikiagent_core::tool::ToolRegistry;

    #[test]
    fn defaults_only_enable_wikipedia() {
        let registry = ToolRegistry::from_handlers(default_handlers(&ToolsConfig::default()));
        assert_eq!(registry.names(), vec!["search_wikipedia_titles", "get_wikipedia_article"]);
    }

    #[test]
    fn configured_handlers_are_added() {
        let config = ToolsConfig {
            documents_dir: Some("docs".into()),
            svn_repository: Some(".".into()),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::from_handlers(default_handlers(&config));
        assert_eq!(registry.len(), 4);
        assert!(registry.get("search_documents").is_some());
        assert!(registry.get("svn_operation").is_some());
        assert!(registry.get(database::TOOL_NAME).is_none());
    }

    #[tokio::test]
    async fn database_url_enables_schema_tool() {
        let config = ToolsConfig {
            database_url: Some("postgres://reader@localhost:1/app".into()),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::from_handlers(default_handlers(&config));
        assert_eq!(registry.len(), 3);
        assert!(registry.get("explore_database_schema").is_some());
    }
}
