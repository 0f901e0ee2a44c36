//! `wikiagent chat` and `wikiagent ask`: interactive and single-message mode.

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use wikiagent_agent::{Orchestrator, QueryOutcome};
use wikiagent_core::memory::MessageLog;
use wikiagent_core::CancellationToken;

use crate::runtime::{Runtime, load_config};

const MEMORY_PREVIEW: usize = 10;

pub async fn ask(config_path: Option<&Path>, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let debug = config.debug;
    let runtime = Runtime::build(config)?;
    let printer = runtime.spawn_event_printer();
    let mut interrupts = listen_for_interrupts();

    let outcome = answer(&runtime.orchestrator, message, &mut interrupts).await;
    runtime.shutdown(printer).await;

    println!("{}", outcome.answer);
    if debug {
        print_metrics(&outcome);
    }
    Ok(())
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let debug = config.debug;
    let runtime = Runtime::build(config)?;
    let printer = runtime.spawn_event_printer();
    let mut interrupts = listen_for_interrupts();
    let orchestrator = &runtime.orchestrator;
    let settings = orchestrator.settings();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        WikiAgent - Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", orchestrator.provider_name());
    println!(
        "  Mode:       {}",
        if settings.react_mode() { "ReAct (multi-tool loop)" } else { "legacy (single tool call)" }
    );
    println!("  Iterations: up to {}", settings.max_iterations);
    println!("  Tools:      {}", orchestrator.available_tools().len());
    println!();
    println!("  Commands: /tools, /memory, /clear, exit");
    println!("  Ctrl+C cancels the running query, or exits at the prompt.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Input::Line(line) = next_input(&mut lines, &mut interrupts).await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" | "/exit" | "/quit" => break,
            "/tools" => print_tools(orchestrator),
            "/memory" => print_memory(orchestrator.log()),
            "/clear" => {
                orchestrator.log().clear_all();
                println!("  Conversation cleared.");
                println!();
            }
            query => {
                let outcome = answer(orchestrator, query, &mut interrupts).await;
                println!();
                for line in outcome.answer.lines() {
                    println!("  Assistant > {line}");
                }
                if debug {
                    print_metrics(&outcome);
                }
                println!();
            }
        }
        prompt()?;
    }

    runtime.shutdown(printer).await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// What the prompt produced.
#[derive(Debug, PartialEq)]
enum Input {
    Line(String),
    Interrupted,
    Closed,
}

/// Forward every Ctrl+C for the rest of the session.
///
/// The signal handler stays installed once armed, so there is exactly one
/// listener and the chat loop decides what an interrupt means.
fn listen_for_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next input line; an interrupt at the prompt ends the session.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?.map_or(Input::Closed, Input::Line)),
        Some(()) = interrupts.recv() => Ok(Input::Interrupted),
    }
}

/// Run one query; an interrupt cancels it and the partial outcome is returned.
async fn answer(
    orchestrator: &Orchestrator,
    query: &str,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> QueryOutcome {
    let cancel = CancellationToken::new();
    let run = orchestrator.run_query(query, &cancel);
    tokio::pin!(run);

    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        Some(()) = interrupts.recv() => {
            cancel.cancel();
            run.await
        }
    };

    // A late Ctrl+C belongs to this query, not to the next prompt
    while interrupts.try_recv().is_ok() {}
    outcome
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_tools(orchestrator: &Orchestrator) {
    println!();
    println!("  Available tools:");
    for tool in orchestrator.available_tools() {
        println!("   - {}: {}", tool.name, tool.description);
    }
    println!();
}

fn print_memory(log: &MessageLog) {
    let global = log.snapshot_global();
    println!();
    println!("  Global log: {} message(s)", global.len());
    let skip = global.len().saturating_sub(MEMORY_PREVIEW);
    for message in &global[skip..] {
        let preview: String = message.content.chars().take(100).collect();
        println!("   [{}] {}", message.role.as_str(), preview.replace('\n', " "));
    }
    for module in log.module_names() {
        println!("  Module '{module}': {} message(s)", log.module(&module).len());
    }
    println!("  Total: {} message(s)", log.total_message_count());
    println!();
}

fn print_metrics(outcome: &QueryOutcome) {
    let Some(execution) = &outcome.execution else {
        eprintln!("  [metrics] legacy mode, no execution trace");
        return;
    };
    let tokens = execution.token_totals();
    eprintln!(
        "  [metrics] {} iteration(s), {} with tools, {}ms, {} tokens over {} call(s), {}",
        execution.total_iterations(),
        execution.tool_calls_count(),
        execution.duration_ms,
        tokens.total_tokens,
        tokens.calls,
        execution.termination_reason()
    );
}
