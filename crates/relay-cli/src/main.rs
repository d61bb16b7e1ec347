//! Relay CLI — a terminal chat client for MCP tool servers.

mod commands;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use relay_agent::{Agent, ToolRouter};
use relay_api::GeminiProvider;
use relay_config::{CliOverrides, RelayConfig};
use relay_mcp::McpManager;
use relay_session::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use std::io;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "relay", version, about = "A terminal chat client for MCP tool servers")]
struct Cli {
    /// Path to the config file (default: ~/.relay/relay.toml)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    // A missing credential fails here, before any server subprocess starts.
    let config = RelayConfig::load(CliOverrides {
        config_path: cli.config,
        model: cli.model,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let provider = GeminiProvider::new(&config.api_key, &config.api_base_url)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Failed to create API client")?;

    let manager = McpManager::start(config.registry.clone()).await;
    let router = ToolRouter::from_manager(&manager);

    let mut agent = Agent::new(Arc::new(provider), router, config.model.clone());
    agent.set_system_prompt(system_prompt());
    agent.set_temperature(config.temperature);
    if let Some(max) = config.max_output_tokens {
        agent.set_max_output_tokens(max);
    }

    let checkpointer: Box<dyn Checkpointer> = if config.persist_sessions {
        Box::new(
            FileCheckpointer::new(config.sessions_dir.clone())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("Failed to open the session store")?,
        )
    } else {
        Box::new(MemoryCheckpointer::new())
    };

    print_banner(&config, &manager);

    let result = repl::run(&agent, &manager, checkpointer.as_ref()).await;

    manager.shutdown().await;
    result
}

fn print_banner(config: &RelayConfig, manager: &McpManager) {
    let tool_count: usize = manager
        .server_summary()
        .iter()
        .map(|(_, count)| count)
        .sum();
    println!(
        "relay v{} (model: {}, {} servers connected, {} tools)",
        env!("CARGO_PKG_VERSION"),
        config.model,
        manager.client_count(),
        tool_count
    );
    for (name, count) in manager.server_summary() {
        println!("  server '{name}': {count} tools");
    }
    println!("Type a question, or use one of the following commands:");
    println!("  /prompts                                        - list available prompts from all servers");
    println!("  /prompt <server_name> <prompt_name> \"args\"...   - run a specific prompt from a server");
    println!("  /resources                                      - list available resources from all servers");
    println!("  /resource <server_name> <resource_uri>          - load a resource for the agent");
    println!("  Type 'exit', 'quit', or 'q' to quit");
}

fn system_prompt() -> String {
    "You are a helpful assistant with access to tools provided by connected servers. \
     Use the tools when necessary based on the user's request. Provide clear, helpful \
     responses and feel free to suggest related actions when appropriate."
        .to_string()
}
