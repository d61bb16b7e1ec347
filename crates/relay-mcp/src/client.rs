//! MCP client — one server connection.
//!
//! Handles the protocol handshake (`initialize` + `initialized` notification)
//! and the capability surface a session exposes: tools, resources, and
//! prompts.

use crate::config::ServerConfig;
use crate::error::McpError;
use crate::transport::StdioTransport;
use serde::Deserialize;
use std::collections::HashMap;

/// MCP protocol version we speak.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// A tool exposed by an MCP server.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A resource exposed by an MCP server, addressed by URI.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceInfo {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A prompt template exposed by an MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Declared arguments, in the order the server lists them.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// One declared argument of a prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

/// Result of calling a tool: content coerced to text.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

/// Client for a single MCP server.
pub struct McpClient {
    name: String,
    transport: StdioTransport,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct ResourcesListResult {
    resources: Vec<ResourceInfo>,
}

#[derive(Deserialize)]
struct PromptsListResult {
    prompts: Vec<PromptInfo>,
}

#[derive(Deserialize)]
struct ResourceReadResult {
    contents: Vec<ResourceContents>,
}

#[derive(Deserialize)]
struct ResourceContents {
    /// Text form of the part. Binary parts carry `blob` instead, which has no
    /// usable text form and deserializes to `None` here.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ToolCallResult {
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct PromptGetResult {
    messages: Vec<PromptMessage>,
}

#[derive(Deserialize)]
struct PromptMessage {
    content: serde_json::Value,
}

impl McpClient {
    /// Connect to an MCP server: spawn the process and run the handshake.
    pub async fn connect(name: String, config: &ServerConfig) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(config)?;

        let init_params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "relay",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let resp = transport.request("initialize", Some(init_params)).await?;
        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: name,
                code: err.code,
                message: err.message,
            });
        }

        transport.notify("notifications/initialized", None).await?;

        tracing::debug!("MCP server '{name}' initialized");
        Ok(Self { name, transport })
    }

    /// The server name this client is connected to.
    pub fn server_name(&self) -> &str {
        &self.name
    }

    /// List the tools this server exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let result: ToolsListResult = self.call("tools/list", None).await?;
        Ok(result
            .tools
            .into_iter()
            .map(|t| ToolInfo {
                name: t.name,
                description: t.description.unwrap_or_default(),
                input_schema: t.input_schema,
            })
            .collect())
    }

    /// Call a tool on this server, coercing the result content to text.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let result: ToolCallResult = self.call("tools/call", Some(params)).await?;

        let text = result
            .content
            .iter()
            .filter_map(|item| match item.kind.as_str() {
                "text" => item.text.as_deref(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutcome {
            text,
            is_error: result.is_error,
        })
    }

    /// List the resources this server exposes.
    pub async fn list_resources(&self) -> Result<Vec<ResourceInfo>, McpError> {
        let result: ResourcesListResult = self.call("resources/list", None).await?;
        Ok(result.resources)
    }

    /// Fetch a resource by URI, coercing its content parts to one joined
    /// text form. Binary-only resources yield an empty string, which callers
    /// treat as unreadable.
    pub async fn get_resource(&self, uri: &str) -> Result<String, McpError> {
        let params = serde_json::json!({ "uri": uri });
        let result: ResourceReadResult = self.call("resources/read", Some(params)).await?;

        let text = result
            .contents
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    /// List the prompt templates this server exposes.
    pub async fn list_prompts(&self) -> Result<Vec<PromptInfo>, McpError> {
        let result: PromptsListResult = self.call("prompts/list", None).await?;
        Ok(result.prompts)
    }

    /// Render a prompt template with the given argument values and return the
    /// text of its first message.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<String, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let result: PromptGetResult = self.call("prompts/get", Some(params)).await?;

        let first = result.messages.first().ok_or_else(|| {
            McpError::Protocol(format!("Prompt '{name}' rendered to zero messages"))
        })?;

        first
            .content
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                McpError::Protocol(format!("Prompt '{name}' rendered to non-text content"))
            })
    }

    /// Shut down the server connection.
    pub async fn shutdown(self) {
        self.transport.shutdown().await;
    }

    /// Issue one request and deserialize its `result` field, mapping JSON-RPC
    /// errors to `McpError::JsonRpc`.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, McpError> {
        let resp = self.transport.request(method, params).await?;

        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }

        let result = resp.result.ok_or_else(|| {
            McpError::Protocol(format!("{method} response has neither result nor error"))
        })?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse {method} result: {e}")))
    }
}
