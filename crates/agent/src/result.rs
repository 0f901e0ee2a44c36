//! Execution records: what one engine run did, round by round.
//!
//! A [`ReActStep`] is created per round and never changed once pushed onto
//! [`ExecutionResult::steps`]. The result is assembled by the engine and
//! handed back once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use wikiagent_core::provider::Usage;

/// One dispatched tool call inside a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAction {
    pub call_id: String,
    pub tool_name: String,
    /// Canonical argument text
    pub arguments: String,
    pub observation: String,
    /// Whether a handler ran and returned normally
    pub success: bool,
}

/// One round of the loop.
///
/// `tool_name`, `tool_arguments` and `observation` hold the round's last
/// dispatched call; `actions` holds every call in dispatch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReActStep {
    /// 1-based round index
    pub iteration: usize,

    /// Text the model sent alongside its tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,

    /// This round produced the run's answer
    pub is_complete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ToolAction>,
}

impl ReActStep {
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            thought: None,
            tool_name: None,
            tool_arguments: None,
            observation: None,
            is_complete: false,
            final_answer: None,
            timestamp: Utc::now(),
            duration_ms: 0,
            usage: None,
            actions: Vec::new(),
        }
    }

    /// Record a dispatched call; the step's summary fields follow the
    /// latest one.
    pub fn record_action(&mut self, action: ToolAction) {
        self.tool_name = Some(action.tool_name.clone());
        self.tool_arguments = Some(action.arguments.clone());
        self.observation = Some(action.observation.clone());
        self.actions.push(action);
    }

    /// Mark this round as the one that produced the answer.
    pub fn complete(&mut self, answer: impl Into<String>) {
        self.is_complete = true;
        self.final_answer = Some(answer.into());
    }

    pub fn used_tool(&self) -> bool {
        self.tool_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// The observation, unless absent or empty.
    pub fn last_observation(&self) -> Option<&str> {
        self.observation.as_deref().filter(|o| !o.is_empty())
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model answered without requesting a tool
    DirectResponse,

    /// The reserved last round produced the answer
    FinalAnswerForced,

    /// The consecutive-duplicate breaker fired
    LoopDetected { duplicates: usize },

    /// Multi-tool looping is off; the first round's observation is the answer
    SingleTool,

    /// Every round ran without an explicit answer
    BudgetExhausted {
        max_iterations: usize,
        used_observation: bool,
    },

    /// A backend failure ended the run
    Failed { kind: String },
}

impl TerminationReason {
    /// Whether the run still counts as successful.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectResponse => write!(f, "direct response, no tool invocation"),
            Self::FinalAnswerForced => write!(f, "final answer forced at iteration budget"),
            Self::LoopDetected { duplicates } => {
                write!(f, "loop detected - {duplicates} duplicate invocations")
            }
            Self::SingleTool => write!(f, "single-tool mode"),
            Self::BudgetExhausted {
                max_iterations,
                used_observation: true,
            } => write!(f, "iteration budget of {max_iterations} exhausted - used last observation"),
            Self::BudgetExhausted {
                max_iterations,
                used_observation: false,
            } => write!(f, "iteration budget of {max_iterations} exhausted - task not completed"),
            Self::Failed { kind } => write!(f, "error: {kind}"),
        }
    }
}

/// Token usage summed over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    /// Backend calls that reported usage
    pub calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The outcome of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub final_answer: String,
    pub steps: Vec<ReActStep>,
    pub success: bool,
    pub termination: TerminationReason,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn total_iterations(&self) -> usize {
        self.steps.len()
    }

    /// Rounds that dispatched at least one tool.
    pub fn tool_calls_count(&self) -> usize {
        self.steps.iter().filter(|s| s.used_tool()).count()
    }

    /// Every dispatched call across all rounds.
    pub fn actions(&self) -> impl Iterator<Item = &ToolAction> {
        self.steps.iter().flat_map(|s| s.actions.iter())
    }

    pub fn token_totals(&self) -> TokenTotals {
        self.steps
            .iter()
            .filter_map(|s| s.usage)
            .fold(TokenTotals::default(), |mut acc, u| {
                acc.calls += 1;
                acc.prompt_tokens += u64::from(u.prompt_tokens);
                acc.completion_tokens += u64::from(u.completion_tokens);
                acc.total_tokens += u64::from(u.total_tokens);
                acc
            })
    }

    pub fn termination_reason(&self) -> String {
        self.termination.to_string()
    }
}
