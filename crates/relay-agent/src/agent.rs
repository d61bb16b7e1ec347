//! The agent turn loop: chat, execute requested tools, chat again, until the
//! model replies with no pending tool calls.

use crate::router::ToolRouter;
use relay_types::{
    ChatRequest, ContentBlock, Message, Provider, RelayError, Role, Usage, truncate_str,
};
use std::sync::Arc;

/// Maximum number of chat → tools cycles in one turn.
const MAX_TOOL_LOOPS: usize = 50;

/// Events emitted by the agent during a turn.
#[derive(Debug)]
pub enum AgentEvent {
    /// A tool is about to be executed.
    ToolStart { name: String, input: String },
    /// A tool has finished executing.
    ToolEnd {
        name: String,
        output: String,
        is_error: bool,
    },
    /// Accumulated usage for the turn.
    Usage(Usage),
    /// The turn finished (no more tool calls).
    Done,
    /// An error occurred.
    Error(String),
}

/// Drives the conversation with the model and executes its tool calls.
pub struct Agent {
    provider: Arc<dyn Provider>,
    router: ToolRouter,
    model: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
    system_prompt: Option<String>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, router: ToolRouter, model: String) -> Self {
        Self {
            provider,
            router,
            model,
            temperature: 0.0,
            max_output_tokens: None,
            system_prompt: None,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = Some(prompt);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn set_max_output_tokens(&mut self, max: u32) {
        self.max_output_tokens = Some(max);
    }

    /// Run one turn over `messages`, appending the assistant's replies and
    /// any tool results in place. The callback receives AgentEvents as they
    /// occur. Returns the turn's accumulated usage.
    pub async fn run<F>(
        &self,
        messages: &mut Vec<Message>,
        mut on_event: F,
    ) -> Result<Usage, RelayError>
    where
        F: FnMut(AgentEvent),
    {
        let mut total_usage = Usage::default();

        for loop_iter in 0..MAX_TOOL_LOOPS {
            let mut request = ChatRequest {
                model: self.model.clone(),
                system: self.system_prompt.clone(),
                messages: std::mem::take(messages),
                tools: self.router.definitions().to_vec(),
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            };

            let result = self.provider.complete(&request).await;

            // Restore messages immediately — O(1) instead of clone's O(n)
            *messages = std::mem::take(&mut request.messages);

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    on_event(AgentEvent::Error(e.to_string()));
                    return Err(RelayError::Api(e));
                }
            };
            total_usage.add(&reply.usage);

            let tool_uses: Vec<(String, String, serde_json::Value)> = reply
                .message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            messages.push(reply.message);

            if tool_uses.is_empty() {
                on_event(AgentEvent::Done);
                on_event(AgentEvent::Usage(total_usage.clone()));
                return Ok(total_usage);
            }

            // Execute the requested tools and feed the results back.
            tracing::debug!(
                "loop {}: executing {} tool calls",
                loop_iter,
                tool_uses.len()
            );
            let mut tool_results = Vec::new();
            for (tool_id, tool_name, tool_input) in tool_uses {
                on_event(AgentEvent::ToolStart {
                    name: tool_name.clone(),
                    input: truncate_for_display(&tool_input.to_string(), 200),
                });

                let outcome = self.router.execute(&tool_name, tool_input).await;

                on_event(AgentEvent::ToolEnd {
                    name: tool_name.clone(),
                    output: truncate_for_display(&outcome.text, 200),
                    is_error: outcome.is_error,
                });

                tool_results.push(ContentBlock::ToolResult {
                    tool_use_id: tool_id,
                    name: tool_name,
                    content: outcome.text,
                    is_error: if outcome.is_error { Some(true) } else { None },
                });
            }

            messages.push(Message {
                role: Role::User,
                content: tool_results,
            });
        }

        on_event(AgentEvent::Error(
            "Maximum tool-use loops reached".to_string(),
        ));
        Ok(total_usage)
    }
}

fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", truncate_str(s, max_len))
    }
}
