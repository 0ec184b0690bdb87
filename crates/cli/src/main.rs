//! Agora CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config directory and default config.toml
//! - `agents`  — List the registered agents and their policies
//! - `invoke`  — Dispatch a single request from the terminal
//! - `serve`   — Start the HTTP gateway

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agora",
    about = "Agora — agent marketplace dispatch runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// List registered agents
    Agents,

    /// Invoke an agent once and print the result envelope
    Invoke {
        /// Agent id (e.g. "translator")
        agent: String,

        /// JSON payload, e.g. '{"text": "hello", "target": "fr"}'
        #[arg(short, long)]
        payload: String,

        /// Optional request id for tracing; generated when omitted
        #[arg(short, long)]
        request_id: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
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
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agents => commands::agents::run().await?,
        Commands::Invoke {
            agent,
            payload,
            request_id,
        } => commands::invoke::run(agent, payload, request_id).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
    }

    Ok(())
}
