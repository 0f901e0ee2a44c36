//! ReAct engine: Thought → Action → Observation, bounded.
//!
//! Each round sends the running context to the backend. A response without
//! tool calls ends the run; otherwise every requested call is dispatched
//! in order and its observation is appended as a tool-result message
//! before the next round starts.
//!
//! # Termination
//!
//! A run always ends in one of these ways:
//! - the model answers directly
//! - the reserved last round forces a tool-free answer
//! - the consecutive-duplicate breaker fires
//! - single-tool mode stops after the first round
//! - the iteration budget runs out (best-effort answer)
//! - a backend failure or cancellation (`success = false`)
//!
//! [`ReactEngine::run`] never returns an error; every outcome is described
//! by the returned [`ExecutionResult`].

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use wikiagent_config::ReactSettings;
use wikiagent_core::error::{BackendError, ProviderError};
use wikiagent_core::event::{AgentEvent, EventSink, TracingSink};
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::{Message, Role};
use wikiagent_core::provider::{BackendResponse, Provider};
use wikiagent_core::tool::{ToolCall, ToolRegistry};
use wikiagent_core::CancellationToken;

use crate::result::{ExecutionResult, ReActStep, TerminationReason, ToolAction};
use crate::sanitize::sanitize_context;

/// Module log that receives the tool trace.
pub const TRACE_MODULE: &str = "react";

const NO_ANSWER: &str = "No response was generated.";
const SINGLE_TOOL_FALLBACK: &str = "Execution completed.";
const NOT_COMPLETED: &str = "The iteration limit was reached without completing the task.";
const PREVIEW_CHARS: usize = 500;

/// Runs one query through the bounded tool loop.
pub struct ReactEngine {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    log: MessageLog,
    settings: ReactSettings,
    sink: Arc<dyn EventSink>,
}

/// Mutable state of a single run.
struct RunState {
    context: Vec<Message>,
    steps: Vec<ReActStep>,
    last_signature: Option<(String, String)>,
    consecutive_duplicates: usize,
}

impl RunState {
    fn any_tool_used(&self) -> bool {
        self.steps.iter().any(|s| s.used_tool())
    }

    fn any_observation(&self) -> bool {
        self.steps.iter().any(|s| s.last_observation().is_some())
    }

    fn last_observation(&self) -> Option<String> {
        self.steps
            .iter()
            .rev()
            .find_map(|s| s.last_observation())
            .map(str::to_string)
    }
}

/// How a run ended, before the result is assembled.
type Outcome = Result<(String, TerminationReason), BackendError>;

impl ReactEngine {
    /// Create an engine that reports through a [`TracingSink`].
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        log: MessageLog,
        settings: ReactSettings,
    ) -> Self {
        let sink = Arc::new(TracingSink::new(settings.show_intermediate_steps));
        Self {
            provider,
            tools,
            log,
            settings,
            sink,
        }
    }

    /// Report events somewhere else.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &ReactSettings {
        &self.settings
    }

    fn max_iterations(&self) -> usize {
        self.settings.max_iterations.max(1)
    }

    /// Run `query` on top of `history`. `history` is copied, never changed.
    pub async fn run(
        &self,
        query: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let max_iterations = self.max_iterations();

        self.sink.emit(AgentEvent::RunStarted {
            query: query.to_string(),
            max_iterations,
            provider: self.provider.provider_name(),
            timestamp: started_at,
        });

        let mut state = RunState {
            context: history.to_vec(),
            steps: Vec::new(),
            last_signature: None,
            consecutive_duplicates: 0,
        };

        let outcome = self.drive(query, &mut state, cancel).await;

        let (final_answer, success, termination) = match outcome {
            Ok((answer, reason)) => (answer, true, reason),
            Err(e) => {
                let iteration = state.steps.len();
                warn!(iteration, error = %e, "ReAct run failed");
                self.sink.emit(AgentEvent::RunFailed {
                    iteration,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                (
                    format!("Error during execution: {e}"),
                    false,
                    TerminationReason::Failed { kind: e.kind() },
                )
            }
        };

        let result = ExecutionResult {
            final_answer,
            steps: state.steps,
            success,
            termination,
            started_at,
            ended_at: Utc::now(),
            duration_ms: elapsed_ms(clock),
        };

        info!(
            success = result.success,
            iterations = result.total_iterations(),
            tool_calls = result.tool_calls_count(),
            reason = %result.termination,
            "ReAct run finished"
        );
        self.sink.emit(AgentEvent::RunFinished {
            success: result.success,
            iterations: result.total_iterations(),
            tool_calls: result.tool_calls_count(),
            reason: result.termination_reason(),
            duration_ms: result.duration_ms,
        });

        result
    }

    /// The round loop. Every exit path has pushed its step.
    async fn drive(&self, query: &str, state: &mut RunState, cancel: &CancellationToken) -> Outcome {
        let max_iterations = self.max_iterations();

        for iteration in 1..=max_iterations {
            let clock = Instant::now();
            let mut step = ReActStep::new(iteration);
            self.sink.emit(AgentEvent::RoundStarted {
                iteration,
                max_iterations,
            });

            let remaining = max_iterations - iteration + 1;
            if remaining == self.settings.iteration_warning_threshold && state.any_tool_used() {
                self.sink.emit(AgentEvent::BudgetWarning { iteration, remaining });
                state.context.push(Message::system(format!(
                    "IMPORTANT: only {remaining} of {max_iterations} iterations remain. \
                     If you already have enough information, prepare a final answer for the user. \
                     Use further tools only if strictly necessary."
                )));
            }

            if self.settings.reserve_last_iteration_for_final_answer
                && iteration == max_iterations
                && state.any_observation()
            {
                self.sink.emit(AgentEvent::FinalRoundForced { iteration });
                state.context.push(Message::system(format!(
                    "You have reached the final iteration ({max_iterations}/{max_iterations}). \
                     You can NOT invoke any more tools. Write the final answer for the user now, \
                     based on everything gathered so far."
                )));
                let response = self.call_backend(query, state, iteration, cancel).await;
                return self.finish_forced(step, clock, response, state, TerminationReason::FinalAnswerForced);
            }

            let response = match self.call_backend(query, state, iteration, cancel).await {
                Ok(response) => response,
                Err(e) => {
                    step.duration_ms = elapsed_ms(clock);
                    state.steps.push(step);
                    return Err(e);
                }
            };
            step.usage = response.usage;

            if !response.has_tool_calls() {
                let answer = response.text_content().unwrap_or(NO_ANSWER).to_string();
                step.complete(answer.clone());
                step.duration_ms = elapsed_ms(clock);
                state.steps.push(step);
                return Ok((answer, TerminationReason::DirectResponse));
            }

            step.thought = response.text_content().map(str::to_string);
            state.context.push(Message::assistant_with_tool_calls(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for (index, call) in response.tool_calls.iter().enumerate() {
                if self.track_duplicate(call, state, iteration) {
                    let duplicates = state.consecutive_duplicates;
                    self.sink.emit(AgentEvent::LoopDetected {
                        iteration,
                        tool_name: call.name.clone(),
                        duplicates,
                    });
                    // Every call in the assistant turn needs a result
                    state.context.push(Message::tool_result(
                        call.id.clone(),
                        format!("Skipped: '{}' was already invoked with identical arguments.", call.name),
                    ));
                    for pending in &response.tool_calls[index + 1..] {
                        state.context.push(Message::tool_result(
                            pending.id.clone(),
                            format!("Skipped: tool execution stopped before '{}' ran.", pending.name),
                        ));
                    }
                    state.context.push(Message::system(
                        "You are invoking the same tool repeatedly. Do NOT invoke any more tools. \
                         Answer the user now with the information you already have.",
                    ));
                    let response = self.call_backend(query, state, iteration, cancel).await;
                    return self.finish_forced(
                        step,
                        clock,
                        response,
                        state,
                        TerminationReason::LoopDetected { duplicates },
                    );
                }

                let dispatched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    action = self.dispatch(call, iteration) => Some(action),
                };
                if let Some(action) = dispatched {
                    state
                        .context
                        .push(Message::tool_result(call.id.clone(), action.observation.clone()));
                    step.record_action(action);
                }
                if cancel.is_cancelled() {
                    step.duration_ms = elapsed_ms(clock);
                    state.steps.push(step);
                    return Err(ProviderError::Cancelled.into());
                }
            }

            step.duration_ms = elapsed_ms(clock);
            let single_tool_answer = step.last_observation().unwrap_or(SINGLE_TOOL_FALLBACK).to_string();
            state.steps.push(step);

            if !self.settings.enable_multi_tool_loop {
                return Ok((single_tool_answer, TerminationReason::SingleTool));
            }
        }

        warn!(max_iterations, "Iteration budget exhausted without a final answer");
        let last = state.steps.last().and_then(|s| s.last_observation()).map(str::to_string);
        let used_observation = last.is_some();
        Ok((
            last.unwrap_or_else(|| NOT_COMPLETED.to_string()),
            TerminationReason::BudgetExhausted {
                max_iterations,
                used_observation,
            },
        ))
    }

    /// Update the duplicate counter for `call`. Returns `true` when the
    /// breaker fires.
    fn track_duplicate(&self, call: &ToolCall, state: &mut RunState, iteration: usize) -> bool {
        let signature = call.signature();
        let repeated = state.last_signature.as_ref() == Some(&signature);
        state.last_signature = Some(signature);

        if !(self.settings.prevent_duplicate_tool_calls && repeated) {
            state.consecutive_duplicates = 0;
            return false;
        }

        state.consecutive_duplicates += 1;
        debug!(tool = %call.name, consecutive = state.consecutive_duplicates, "Duplicate tool call");
        self.sink.emit(AgentEvent::DuplicateToolCall {
            iteration,
            tool_name: call.name.clone(),
            consecutive: state.consecutive_duplicates,
        });
        state.consecutive_duplicates >= self.settings.max_consecutive_duplicates
    }

    /// Close a forced-final or loop-break round.
    ///
    /// A failed call falls back to the last observation when one exists;
    /// cancellation never does.
    fn finish_forced(
        &self,
        mut step: ReActStep,
        clock: Instant,
        response: Result<BackendResponse, BackendError>,
        state: &mut RunState,
        reason: TerminationReason,
    ) -> Outcome {
        let answer = match response {
            Ok(response) => {
                step.usage = response.usage;
                Ok(response.text_content().unwrap_or(NO_ANSWER).to_string())
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                let fallback = step
                    .last_observation()
                    .map(str::to_string)
                    .or_else(|| state.last_observation());
                match fallback {
                    Some(observation) => {
                        warn!(error = %e, "Final answer call failed, using last observation");
                        Ok(observation)
                    }
                    None => Err(e),
                }
            }
        };

        if let Ok(answer) = &answer {
            step.complete(answer.clone());
        }
        step.duration_ms = elapsed_ms(clock);
        state.steps.push(step);
        answer.map(|answer| (answer, reason))
    }

    /// One sanitized, cancellable backend round trip.
    async fn call_backend(
        &self,
        query: &str,
        state: &mut RunState,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        let rewritten = sanitize_context(&mut state.context);
        if rewritten > 0 {
            debug!(rewritten, "Sanitized empty assistant messages");
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled.into());
        }

        let clock = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::from(ProviderError::Cancelled)),
            response = self.provider.send_message(query, &state.context, cancel) => response,
        }?;

        self.sink.emit(AgentEvent::BackendResponded {
            iteration,
            tool_calls: response.tool_calls.len(),
            duration_ms: elapsed_ms(clock),
        });
        Ok(response)
    }

    /// Execute one call and trace it in the module log.
    async fn dispatch(&self, call: &ToolCall, iteration: usize) -> ToolAction {
        let arguments = call.arguments.canonical();
        self.sink.emit(AgentEvent::ToolDispatched {
            iteration,
            tool_name: call.name.clone(),
            arguments: arguments.clone(),
        });

        let result = self.tools.dispatch(call, &self.log).await;

        self.sink.emit(AgentEvent::ToolObserved {
            iteration,
            tool_name: call.name.clone(),
            success: result.success,
            preview: preview(&result.output),
        });
        self.log.append_module(
            TRACE_MODULE,
            Role::Tool,
            format!("[{iteration}] {}: {}", call.name, result.output),
        );

        ToolAction {
            call_id: result.call_id,
            tool_name: call.name.clone(),
            arguments,
            observation: result.output,
            success: result.success,
        }
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
        out.push_str("...");
        out
    }
}
