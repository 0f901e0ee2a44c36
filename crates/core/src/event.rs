//! Agent events: the engine reports progress through an injected sink
//! instead of printing.
//!
//! Presentation layers either implement [`EventSink`] directly or subscribe
//! to the broadcast [`EventBus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Severity attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Everything the engine reports while running one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        query: String,
        max_iterations: usize,
        provider: String,
        timestamp: DateTime<Utc>,
    },

    RoundStarted {
        iteration: usize,
        max_iterations: usize,
    },

    /// The budget is closing and the model was nudged toward an answer
    BudgetWarning {
        iteration: usize,
        remaining: usize,
    },

    /// The last round was reserved for a tool-free answer
    FinalRoundForced {
        iteration: usize,
    },

    BackendResponded {
        iteration: usize,
        tool_calls: usize,
        duration_ms: u64,
    },

    ToolDispatched {
        iteration: usize,
        tool_name: String,
        arguments: String,
    },

    ToolObserved {
        iteration: usize,
        tool_name: String,
        success: bool,
        preview: String,
    },

    DuplicateToolCall {
        iteration: usize,
        tool_name: String,
        consecutive: usize,
    },

    LoopDetected {
        iteration: usize,
        tool_name: String,
        duplicates: usize,
    },

    RunFinished {
        success: bool,
        iterations: usize,
        tool_calls: usize,
        reason: String,
        duration_ms: u64,
    },

    RunFailed {
        iteration: usize,
        kind: String,
        message: String,
    },
}

impl AgentEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            Self::RoundStarted { .. } | Self::BackendResponded { .. } => EventLevel::Debug,
            Self::RunStarted { .. }
            | Self::ToolDispatched { .. }
            | Self::ToolObserved { .. }
            | Self::RunFinished { .. } => EventLevel::Info,
            Self::BudgetWarning { .. }
            | Self::FinalRoundForced { .. }
            | Self::DuplicateToolCall { .. }
            | Self::LoopDetected { .. } => EventLevel::Warn,
            Self::RunFailed { .. } => EventLevel::Error,
        }
    }
}

/// Receives engine events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Forwards events to `tracing`.
///
/// Debug and info events pass only when `show_intermediate_steps` is set;
/// warnings and errors always pass.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    show_intermediate_steps: bool,
}

impl TracingSink {
    pub fn new(show_intermediate_steps: bool) -> Self {
        Self { show_intermediate_steps }
    }

    /// Whether an event of this level would be forwarded.
    pub fn passes(&self, level: EventLevel) -> bool {
        self.show_intermediate_steps || level >= EventLevel::Warn
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: AgentEvent) {
        let level = event.level();
        if !self.passes(level) {
            return;
        }
        match level {
            EventLevel::Debug => tracing::debug!(event = ?event, "agent event"),
            EventLevel::Info => tracing::info!(event = ?event, "agent event"),
            EventLevel::Warn => tracing::warn!(event = ?event, "agent event"),
            EventLevel::Error => tracing::error!(event = ?event, "agent event"),
        }
    }
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: AgentEvent) {
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AgentEvent::ToolObserved {
            iteration: 1,
            tool_name: "lookup".into(),
            success: true,
            preview: "result A".into(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            AgentEvent::ToolObserved { tool_name, success, .. } => {
                assert_eq!(tool_name, "lookup");
                assert!(success);
            }
            _ => panic!("Expected ToolObserved event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(AgentEvent::RunFailed {
            iteration: 1,
            kind: "ProviderError::Network".into(),
            message: "no subscribers".into(),
        });
    }

    #[test]
    fn levels() {
        assert_eq!(
            AgentEvent::RoundStarted { iteration: 1, max_iterations: 3 }.level(),
            EventLevel::Debug
        );
        assert_eq!(
            AgentEvent::LoopDetected { iteration: 2, tool_name: "x".into(), duplicates: 2 }.level(),
            EventLevel::Warn
        );
    }

    #[test]
    fn tracing_sink_filters_intermediate_steps() {
        let quiet = TracingSink::new(false);
        assert!(!quiet.passes(EventLevel::Info));
        assert!(!quiet.passes(EventLevel::Debug));
        assert!(quiet.passes(EventLevel::Warn));
        assert!(quiet.passes(EventLevel::Error));
        assert!(TracingSink::new(true).passes(EventLevel::Debug));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::BudgetWarning { iteration: 9, remaining: 2 }).unwrap();
        assert_eq!(json["type"], "budget_warning");
        assert_eq!(json["remaining"], 2);
    }
}
