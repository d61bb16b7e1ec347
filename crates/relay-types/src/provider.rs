//! Provider trait for LLM backends.

use crate::message::{Message, Usage};
use crate::ApiError;
use std::future::Future;
use std::pin::Pin;

/// A tool definition advertised to the model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One completion request: the running history plus the fixed tool set.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

/// The model's reply: an assistant message (text and/or tool calls) plus usage.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: Message,
    pub usage: Usage,
}

/// Trait for LLM backends (Gemini today).
///
/// Providers translate between canonical Relay message types and their native
/// API format. Dyn-compatible so the agent works with `Arc<dyn Provider>`.
pub trait Provider: Send + Sync {
    /// Send one completion request and return the model's reply.
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, ApiError>> + Send + 'a>>;

    /// Provider name for logging/display (e.g., "gemini").
    fn name(&self) -> &str;
}
