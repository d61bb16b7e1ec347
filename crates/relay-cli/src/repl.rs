//! The interactive read-eval-print loop.
//!
//! Each line of input either performs a local listing action, fetches a
//! prompt/resource and folds it into the next outbound message, or forwards
//! the text verbatim to the agent. Every server round-trip here is wrapped so
//! a collaborator failure produces a visible message and the loop continues.

use crate::commands::{self, Command};
use relay_agent::{Agent, AgentEvent};
use relay_mcp::{ServerSession, SessionSource};
use relay_session::Checkpointer;
use relay_types::Message;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::AsyncBufReadExt;

/// Constant session identifier keying the conversation checkpoint.
pub const SESSION_ID: &str = "default";

/// Drive the REPL until an exit token, EOF, or interrupt.
pub async fn run(
    agent: &Agent,
    source: &dyn SessionSource,
    checkpointer: &dyn Checkpointer,
) -> anyhow::Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        // The interrupt is only observed here, between commands — never while
        // a request is in flight.
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => {
                    println!("\nGoodbye!");
                    break;
                }
            },
        };

        let outbound = match Command::parse(&line) {
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::ListPrompts => {
                print!("{}", render_prompt_listing(source).await);
                continue;
            }
            Command::ListResources => {
                print!("{}", render_resource_listing(source).await);
                continue;
            }
            Command::Invalid(msg) => {
                println!("\n{msg}");
                continue;
            }
            Command::InvokePrompt { server, name, args } => {
                println!("\n--- Invoking prompt '{name}' from server '{server}'... ---");
                match invoke_prompt(source, &server, &name, &args).await {
                    Ok(text) => {
                        println!("\n--- Prompt loaded successfully. Preparing to execute... ---");
                        text
                    }
                    Err(msg) => {
                        println!("\nError: {msg}");
                        continue;
                    }
                }
            }
            Command::InvokeResource { server, uri } => {
                println!("\n--- Fetching resource '{uri}' from server '{server}'... ---");
                match fetch_resource(source, &server, &uri).await {
                    Ok(content) => {
                        println!("--- Resource content loaded successfully. ---");
                        print!(
                            "Resource loaded. What should I do with this content? \
                             (Press Enter to just save to context)\n> "
                        );
                        std::io::stdout().flush()?;
                        let instruction = lines.next_line().await?.unwrap_or_default();
                        let instruction = instruction.trim();
                        if instruction.is_empty() {
                            println!(
                                "No action specified. Adding resource content to conversation memory..."
                            );
                            commands::wrap_resource_context(&content)
                        } else {
                            commands::wrap_resource_with_task(&content, instruction)
                        }
                    }
                    Err(msg) => {
                        println!("\nError: {msg}");
                        continue;
                    }
                }
            }
            Command::Chat(text) => text,
        };

        if outbound.is_empty() {
            continue;
        }
        run_turn(agent, checkpointer, &outbound).await;
    }

    Ok(())
}

/// Execute one agent turn for an outbound message.
///
/// The turn runs on a scratch copy of the committed history; the checkpoint
/// is committed only after the turn completes, so a failed turn rolls back to
/// the last known-good state.
async fn run_turn(agent: &Agent, checkpointer: &dyn Checkpointer, outbound: &str) {
    let mut history = match checkpointer.load(SESSION_ID).await {
        Ok(history) => history,
        Err(e) => {
            println!("Error loading conversation state: {e}");
            return;
        }
    };
    history.push(Message::user_text(outbound));

    match agent.run(&mut history, print_agent_event).await {
        Ok(_usage) => {
            let reply = history.last().map(Message::text).unwrap_or_default();
            println!("AI: {reply}");
            if let Err(e) = checkpointer.commit(SESSION_ID, &history).await {
                println!("Warning: failed to save conversation state: {e}");
            }
        }
        Err(e) => {
            println!("Error invoking agent: {e}");
            println!("Please try again or check your input.");
        }
    }
}

fn print_agent_event(event: AgentEvent) {
    match event {
        AgentEvent::ToolStart { name, .. } => println!("  [tool: {name}]"),
        AgentEvent::ToolEnd {
            name,
            output,
            is_error,
        } => {
            if is_error {
                println!("  [tool {name} error: {output}]");
            } else {
                println!("  [tool {name} done: {output}]");
            }
        }
        AgentEvent::Usage(usage) => {
            tracing::debug!(
                "turn usage: input={} output={}",
                usage.input_tokens,
                usage.output_tokens
            );
        }
        AgentEvent::Done => {}
        AgentEvent::Error(e) => eprintln!("Error: {e}"),
    }
}

/// Render the cross-server prompt listing. A failing server becomes a line in
/// the output; it never aborts the listing for the others.
pub async fn render_prompt_listing(source: &dyn SessionSource) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAvailable Prompts from all servers:");
    let _ = writeln!(out, "-----------------------------------");

    let mut any_found = false;
    for name in source.server_names() {
        match fetch_prompt_list(source, &name).await {
            Ok(prompts) => {
                if prompts.is_empty() {
                    continue;
                }
                any_found = true;
                let _ = writeln!(out, "\n--- Server: '{name}' ---");
                for prompt in prompts {
                    let _ = writeln!(out, "  Prompt: {}", prompt.name);
                    if prompt.arguments.is_empty() {
                        let _ = writeln!(out, "    Arguments: None");
                    } else {
                        let args: Vec<String> = prompt
                            .arguments
                            .iter()
                            .map(|arg| format!("<{}>", arg.name))
                            .collect();
                        let _ = writeln!(out, "    Arguments: {}", args.join(" "));
                    }
                    if let Some(desc) = &prompt.description {
                        let _ = writeln!(out, "    Description: {desc}");
                    }
                }
            }
            Err(e) => {
                let _ = writeln!(out, "\nCould not fetch prompts from server '{name}': {e}");
            }
        }
    }

    let _ = writeln!(out, "\n{}", commands::PROMPT_USAGE);
    if !any_found {
        let _ = writeln!(out, "\nNo prompts were found on any connected servers.");
    }
    out
}

/// Render the cross-server resource listing, symmetric to the prompt listing.
pub async fn render_resource_listing(source: &dyn SessionSource) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAvailable Resources from all servers:");
    let _ = writeln!(out, "-------------------------------------");

    let mut any_found = false;
    for name in source.server_names() {
        match fetch_resource_list(source, &name).await {
            Ok(resources) => {
                if resources.is_empty() {
                    continue;
                }
                any_found = true;
                let _ = writeln!(out, "\n--- Server: '{name}' ---");
                for resource in resources {
                    let _ = writeln!(out, "  Resource URI: {}", resource.uri);
                    if let Some(desc) = &resource.description {
                        let _ = writeln!(out, "    Description: {desc}");
                    }
                }
            }
            Err(e) => {
                let _ = writeln!(out, "\nCould not fetch resources from server '{name}': {e}");
            }
        }
    }

    let _ = writeln!(out, "\nUse: {}", commands::RESOURCE_USAGE);
    if !any_found {
        let _ = writeln!(out, "\nNo resources were found on any connected servers.");
    }
    out
}

async fn fetch_prompt_list(
    source: &dyn SessionSource,
    server: &str,
) -> Result<Vec<relay_mcp::PromptInfo>, relay_mcp::McpError> {
    let session = source.open_session(server).await?;
    let result = session.list_prompts().await;
    session.close().await;
    result
}

async fn fetch_resource_list(
    source: &dyn SessionSource,
    server: &str,
) -> Result<Vec<relay_mcp::ResourceInfo>, relay_mcp::McpError> {
    let session = source.open_session(server).await?;
    let result = session.list_resources().await;
    session.close().await;
    result
}

/// Resolve, validate, and render a prompt. Validation failures return the
/// user-facing message and never reach the agent.
pub async fn invoke_prompt(
    source: &dyn SessionSource,
    server: &str,
    name: &str,
    args: &[String],
) -> Result<String, String> {
    let session = source
        .open_session(server)
        .await
        .map_err(|e| format!("An error occurred during prompt invocation: {e}"))?;
    let result = invoke_prompt_on(session.as_ref(), server, name, args).await;
    session.close().await;
    result
}

async fn invoke_prompt_on(
    session: &dyn ServerSession,
    server: &str,
    name: &str,
    args: &[String],
) -> Result<String, String> {
    let prompts = session
        .list_prompts()
        .await
        .map_err(|e| format!("An error occurred during prompt invocation: {e}"))?;

    if prompts.is_empty() {
        return Err(format!(
            "Could not retrieve any prompts from server '{server}'."
        ));
    }

    let Some(def) = prompts.iter().find(|p| p.name == name) else {
        return Err(format!("Prompt '{name}' not found on server '{server}'."));
    };

    let Some(mapping) = commands::zip_prompt_arguments(&def.arguments, args) else {
        let expected: Vec<&str> = def.arguments.iter().map(|arg| arg.name.as_str()).collect();
        return Err(format!(
            "Invalid number of arguments for prompt '{name}'. Expected {} arguments: {}",
            expected.len(),
            expected.join(", ")
        ));
    };

    session
        .get_prompt(name, &mapping)
        .await
        .map_err(|e| format!("An error occurred during prompt invocation: {e}"))
}

/// Fetch a resource's text content. Empty or unreadable content returns the
/// user-facing message and never reaches the agent.
pub async fn fetch_resource(
    source: &dyn SessionSource,
    server: &str,
    uri: &str,
) -> Result<String, String> {
    let session = source
        .open_session(server)
        .await
        .map_err(|e| format!("An error occurred while fetching the resource: {e}"))?;
    let result = session.get_resource(uri).await;
    session.close().await;

    let content = result.map_err(|e| format!("An error occurred while fetching the resource: {e}"))?;
    if content.trim().is_empty() {
        return Err("Resource content is empty or not in a readable text format.".to_string());
    }
    Ok(content)
}
