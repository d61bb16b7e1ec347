//! MCP manager — owns the registry and the long-lived server connections.
//!
//! At startup every registered server is launched once and its tools are
//! aggregated into a flat set that stays fixed for the session. Prompt and
//! resource commands instead use short-lived scoped sessions, opened and
//! released within a single command.

use crate::client::{McpClient, ToolInfo};
use crate::config::ServerRegistry;
use crate::error::McpError;
use crate::session::{BoxFuture, ServerSession, SessionSource};
use std::sync::Arc;

/// Manages connections to all registered MCP servers.
pub struct McpManager {
    registry: ServerRegistry,
    clients: Vec<Arc<McpClient>>,
    tools: Vec<(Arc<McpClient>, ToolInfo)>,
}

impl McpManager {
    /// Launch all registered servers and aggregate their tools.
    ///
    /// Servers that fail to start or to answer `tools/list` are reported and
    /// skipped — the session continues with whatever servers are available.
    pub async fn start(registry: ServerRegistry) -> Self {
        let mut clients = Vec::new();
        let mut tools = Vec::new();

        for name in registry.names() {
            let config = &registry.servers[name];
            let client = match McpClient::connect(name.to_string(), config).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!("Failed to start MCP server '{name}': {e}");
                    eprintln!("Warning: MCP server '{name}' failed to start: {e}");
                    continue;
                }
            };

            match client.list_tools().await {
                Ok(server_tools) => {
                    tracing::info!(
                        "MCP server '{name}' connected with {} tools",
                        server_tools.len()
                    );
                    for tool in server_tools {
                        tools.push((Arc::clone(&client), tool));
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to list tools on MCP server '{name}': {e}");
                    eprintln!("Warning: could not list tools on server '{name}': {e}");
                }
            }
            clients.push(client);
        }

        Self {
            registry,
            clients,
            tools,
        }
    }

    /// The aggregated tool set, each tool paired with its owning client.
    /// Fixed after startup.
    pub fn tools(&self) -> &[(Arc<McpClient>, ToolInfo)] {
        &self.tools
    }

    /// All registered server names, whether or not the server came up.
    /// Listings iterate this so a dead server is reported, not hidden.
    pub fn server_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Open a fresh scoped session to one named server. The caller owns the
    /// session and releases it (via `shutdown`) before the next command.
    pub async fn open_session(&self, name: &str) -> Result<McpClient, McpError> {
        let config = self
            .registry
            .servers
            .get(name)
            .ok_or_else(|| McpError::UnknownServer {
                name: name.to_string(),
            })?;
        McpClient::connect(name.to_string(), config).await
    }

    /// Number of servers that came up at startup.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Connected servers and their tool counts, for the startup banner.
    pub fn server_summary(&self) -> Vec<(&str, usize)> {
        self.clients
            .iter()
            .map(|client| {
                let count = self
                    .tools
                    .iter()
                    .filter(|(owner, _)| Arc::ptr_eq(owner, client))
                    .count();
                (client.server_name(), count)
            })
            .collect()
    }

    /// Shut down all long-lived connections.
    pub async fn shutdown(self) {
        drop(self.tools);
        for client in self.clients {
            if let Ok(client) = Arc::try_unwrap(client) {
                client.shutdown().await;
            }
        }
    }
}

impl SessionSource for McpManager {
    fn server_names(&self) -> Vec<String> {
        McpManager::server_names(self)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn open_session<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn ServerSession>, McpError>> {
        Box::pin(async move {
            let client = McpManager::open_session(self, name).await?;
            Ok(Box::new(client) as Box<dyn ServerSession>)
        })
    }
}
