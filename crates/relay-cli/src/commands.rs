//! Input classification for the REPL.
//!
//! Parsing is pure: one classifier from a raw input line to a `Command`, a
//! quote-aware tokenizer for `/prompt`, and the builders that turn fetched
//! content into outbound messages. All I/O stays in the REPL.

use relay_mcp::PromptArgument;
use std::collections::HashMap;

pub const PROMPT_USAGE: &str = "Usage: /prompt <server_name> <prompt_name> \"arg1\" \"arg2\" ...";
pub const RESOURCE_USAGE: &str = "Usage: /resource <server_name> <resource_uri>";

/// What one line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Terminate the read loop.
    Exit,
    /// List prompts across all registered servers.
    ListPrompts,
    /// List resources across all registered servers.
    ListResources,
    /// Render a named prompt on a named server.
    InvokePrompt {
        server: String,
        name: String,
        args: Vec<String>,
    },
    /// Fetch a resource by URI from a named server.
    InvokeResource { server: String, uri: String },
    /// Plain chat text, forwarded verbatim.
    Chat(String),
    /// Malformed command; carries the user-facing message.
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let lower = input.to_lowercase();

        if matches!(lower.as_str(), "exit" | "quit" | "q") {
            return Self::Exit;
        }
        if lower == "/prompts" {
            return Self::ListPrompts;
        }
        if lower == "/resources" {
            return Self::ListResources;
        }

        match input.split_whitespace().next().unwrap_or("") {
            "/prompt" => match tokenize(input) {
                Err(e) => Self::Invalid(format!("{e}\n{PROMPT_USAGE}")),
                Ok(parts) if parts.len() < 3 => Self::Invalid(PROMPT_USAGE.to_string()),
                Ok(parts) => Self::InvokePrompt {
                    server: parts[1].clone(),
                    name: parts[2].clone(),
                    args: parts[3..].to_vec(),
                },
            },
            "/resource" => {
                let parts: Vec<&str> = input.split_whitespace().collect();
                if parts.len() != 3 {
                    Self::Invalid(RESOURCE_USAGE.to_string())
                } else {
                    Self::InvokeResource {
                        server: parts[1].to_string(),
                        uri: parts[2].to_string(),
                    }
                }
            }
            _ => Self::Chat(input.to_string()),
        }
    }
}

/// Split a command line into tokens with shell-style quoting: whitespace
/// delimits, single or double quotes group, backslash escapes the next
/// character.
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    match chars.next() {
                        Some(next) => current.push(next),
                        None => return Err("Trailing backslash in command".to_string()),
                    }
                } else {
                    current.push(c);
                }
            }
            None => {
                if c.is_whitespace() {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                } else if c == '\'' || c == '"' {
                    quote = Some(c);
                    in_token = true;
                } else if c == '\\' {
                    match chars.next() {
                        Some(next) => {
                            current.push(next);
                            in_token = true;
                        }
                        None => return Err("Trailing backslash in command".to_string()),
                    }
                } else {
                    current.push(c);
                    in_token = true;
                }
            }
        }
    }

    if quote.is_some() {
        return Err("Unclosed quote in command".to_string());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Zip declared prompt argument names with supplied values by position.
/// Returns `None` when the counts do not match.
pub fn zip_prompt_arguments(
    declared: &[PromptArgument],
    supplied: &[String],
) -> Option<HashMap<String, String>> {
    if declared.len() != supplied.len() {
        return None;
    }
    Some(
        declared
            .iter()
            .zip(supplied)
            .map(|(arg, value)| (arg.name.clone(), value.clone()))
            .collect(),
    )
}

/// Wrap fetched resource content and a follow-up instruction into one
/// outbound message.
pub fn wrap_resource_with_task(resource: &str, task: &str) -> String {
    format!("CONTEXT from a loaded resource:\n---\n{resource}\n---\nTASK: {task}")
}

/// Wrap fetched resource content into a "remember this context" message for
/// when no follow-up instruction was given.
pub fn wrap_resource_context(resource: &str) -> String {
    format!(
        "Please remember the following context for our conversation. \
         Just acknowledge that you have received it.\n---\nCONTEXT:\n{resource}\n---"
    )
}
