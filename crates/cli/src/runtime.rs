//! Wiring shared by the commands: configuration, provider, tools,
//! orchestrator, and the event printer.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use wikiagent_agent::Orchestrator;
use wikiagent_config::{AppConfig, ConfigError};
use wikiagent_core::event::{AgentEvent, EventBus, TracingSink};
use wikiagent_core::memory::MessageLog;

const PREVIEW_CHARS: usize = 200;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        None => AppConfig::load(),
        Some(path) => AppConfig::load_with_overrides(path, |key| std::env::var(key).ok()),
    }
}

/// Everything a chat session needs.
pub struct Runtime {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    pub events: Arc<EventBus>,
}

impl Runtime {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = wikiagent_providers::build_from_config(&config)?;
        let provider = router.active()?;
        let handlers = wikiagent_tools::default_handlers(&config.tools);

        let events = Arc::new(EventBus::default());
        let orchestrator = Orchestrator::new(provider, handlers, MessageLog::new(), config.agent.clone())
            .with_sink(events.clone());

        Ok(Self {
            config,
            orchestrator,
            events,
        })
    }

    /// Print engine events to stderr until the bus closes.
    ///
    /// Intermediate steps follow `show_intermediate_steps`; warnings and
    /// failures are always shown.
    pub fn spawn_event_printer(&self) -> JoinHandle<()> {
        let filter = TracingSink::new(self.config.agent.show_intermediate_steps);
        let rx = self.events.subscribe();
        tokio::spawn(forward_events(rx, filter, |line| eprintln!("{line}")))
    }

    /// Drop the bus and wait until `printer` has written every queued event.
    pub async fn shutdown(self, printer: JoinHandle<()>) {
        drop(self);
        if let Err(e) = printer.await {
            tracing::debug!(error = %e, "Event printer stopped abnormally");
        }
    }
}

/// Render every event that passes `filter` until the channel closes.
async fn forward_events<F>(mut rx: broadcast::Receiver<Arc<AgentEvent>>, filter: TracingSink, mut write: F)
where
    F: FnMut(&str),
{
    loop {
        match rx.recv().await {
            Ok(event) => {
                if !filter.passes(event.level()) {
                    continue;
                }
                if let Some(line) = render_event(&event) {
                    write(&line);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// One console line per event; `None` for events not worth a line.
pub fn render_event(event: &AgentEvent) -> Option<String> {
    let line = match event {
        AgentEvent::RunStarted { max_iterations, provider, .. } => {
            format!("  [start] {provider}, up to {max_iterations} iterations")
        }
        AgentEvent::RoundStarted {
            iteration,
            max_iterations,
        } => format!("  [iteration {iteration}/{max_iterations}]"),
        AgentEvent::BudgetWarning { remaining, .. } => {
            format!("  [warning] only {remaining} iterations left, asking for a final answer soon")
        }
        AgentEvent::FinalRoundForced { .. } => "  [final] last iteration reserved for the answer".to_string(),
        AgentEvent::BackendResponded { .. } => return None,
        AgentEvent::ToolDispatched {
            tool_name, arguments, ..
        } => format!("  [tool] {tool_name} {arguments}"),
        AgentEvent::ToolObserved { success, preview, .. } => {
            let marker = if *success { "observation" } else { "tool error" };
            format!("  [{marker}] {}", truncate(preview, PREVIEW_CHARS))
        }
        AgentEvent::DuplicateToolCall {
            tool_name, consecutive, ..
        } => format!("  [duplicate] {tool_name} repeated {consecutive} time(s)"),
        AgentEvent::LoopDetected {
            tool_name, duplicates, ..
        } => format!("  [loop] {tool_name} called {duplicates} times in a row, forcing an answer"),
        AgentEvent::RunFinished {
            iterations,
            tool_calls,
            reason,
            duration_ms,
            ..
        } => format!("  [done] {iterations} iteration(s), {tool_calls} with tools, {duration_ms}ms: {reason}"),
        AgentEvent::RunFailed { kind, message, .. } => format!("  [error] {kind}: {message}"),
    };
    Some(line)
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut out: String = flat.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
