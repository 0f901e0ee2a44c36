//! WikiAgent CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive conversation with the agent
//! - `ask`: Answer a single message and exit
//! - `tools`: List the tools the agent can call
//! - `config`: Show, validate or locate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "wikiagent",
    about = "WikiAgent: a ReAct tool-calling agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.wikiagent/config.toml
    #[arg(short, long, global = true, env = "WIKIAGENT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent interactively
    Chat,

    /// Send a single message and print the answer
    Ask {
        /// The message to answer
        #[arg(short, long)]
        message: String,
    },

    /// List available tools
    Tools {
        /// Print the JSON schema of every tool
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (default)
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat => commands::chat::run(config_path).await?,
        Commands::Ask { message } => commands::chat::ask(config_path, &message).await?,
        Commands::Tools { json } => commands::tools::run(config_path, json).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
