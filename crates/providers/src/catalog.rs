//! Tool catalog: the per-provider set of registered tool definitions.

use std::sync::{PoisonError, RwLock};

use wikiagent_core::tool::ToolDefinition;

/// Registered tools, idempotent by name, in registration order.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: RwLock<Vec<ToolDefinition>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Returns `false` if the name was already present.
    pub fn register(&self, definition: ToolDefinition) -> bool {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.iter().any(|t| t.name == definition.name) {
            return false;
        }
        tools.push(definition);
        true
    }

    pub fn snapshot(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Diagnostic identity shared by every adapter.
pub(crate) fn display_name(name: &str, model: &str, tools: usize) -> String {
    format!("{name} ({model}) [Tools: {tools}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_by_name() {
        let catalog = ToolCatalog::new();
        assert!(catalog.register(ToolDefinition::new("lookup", "first")));
        assert!(!catalog.register(ToolDefinition::new("lookup", "second")));
        assert!(catalog.register(ToolDefinition::new("search", "other")));

        let tools = catalog.snapshot();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].description, "first");
        assert_eq!(tools[1].name, "search");
    }

    #[test]
    fn display_name_format() {
        assert_eq!(display_name("Ollama-Local", "llama3.1", 3), "Ollama-Local (llama3.1) [Tools: 3]");
    }
}
