//! Routes namespaced tool names to the MCP server that owns them.
//!
//! Tool names follow the pattern `mcp__<server>__<tool>` so tools from
//! different servers never collide, and every tool stays addressable by its
//! (server, local name) pair.

use relay_mcp::{McpClient, McpManager, ToolInfo, ToolOutcome};
use relay_types::ToolDefinition;
use std::collections::HashMap;
use std::sync::Arc;

/// The fixed tool set aggregated at startup, indexed by namespaced name.
pub struct ToolRouter {
    routes: HashMap<String, (Arc<McpClient>, String)>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRouter {
    /// Build the router from the manager's aggregated tool set.
    pub fn from_manager(manager: &McpManager) -> Self {
        Self::new(manager.tools().to_vec())
    }

    pub fn new(tools: Vec<(Arc<McpClient>, ToolInfo)>) -> Self {
        let mut routes = HashMap::new();
        let mut definitions = Vec::new();

        for (client, tool) in tools {
            let namespaced = format!("mcp__{}__{}", client.server_name(), tool.name);
            definitions.push(ToolDefinition {
                name: namespaced.clone(),
                description: format!("[{}] {}", client.server_name(), tool.description),
                input_schema: tool.input_schema,
            });
            routes.insert(namespaced, (client, tool.name));
        }

        Self {
            routes,
            definitions,
        }
    }

    /// Tool definitions advertised to the model.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Execute one tool call. Failures — unknown name, transport error — are
    /// folded into an error outcome so the turn can report them to the model
    /// instead of dying.
    pub async fn execute(&self, name: &str, input: serde_json::Value) -> ToolOutcome {
        match self.routes.get(name) {
            None => {
                tracing::warn!("Model requested unknown tool '{name}'");
                ToolOutcome {
                    text: format!("Unknown tool: {name}"),
                    is_error: true,
                }
            }
            Some((client, local_name)) => match client.call_tool(local_name, input).await {
                Ok(outcome) => outcome,
                Err(e) => ToolOutcome {
                    text: format!("Tool call failed: {e}"),
                    is_error: true,
                },
            },
        }
    }
}
