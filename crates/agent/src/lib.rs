//! The ReAct loop, the heart of WikiAgent.
//!
//! The agent follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Receive** a user query through the [`Orchestrator`]
//! 2. **Send** the query and the conversation so far to the provider
//! 3. **If tool calls**: dispatch them in order, append the observations,
//!    loop back to step 2
//! 4. **If text**: that is the final answer
//!
//! The loop is bounded by `max_iterations`, and a repeated identical tool
//! call trips a duplicate breaker. See [`ReactEngine`] for the full set of
//! termination rules.

pub mod engine;
pub mod orchestrator;
pub mod result;
pub mod sanitize;

pub use engine::{ReactEngine, TRACE_MODULE};
pub use orchestrator::{Orchestrator, QueryOutcome};
pub use result::{ExecutionResult, ReActStep, TerminationReason, TokenTotals, ToolAction};
pub use sanitize::{sanitize_context, TOOL_PLACEHOLDER};

#[cfg(test)]
pub(crate) mod test_helpers;
