//! Server registry: how each MCP server is launched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_timeout() -> u64 {
    30000
}

/// The transport an MCP server speaks. Only stdio is shipped today; the
/// variant exists so registry files stay forward-compatible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
}

/// Static mapping from logical server name to its launch description.
/// Defined at startup, never mutated. Server names are unique by construction
/// (map keys).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerRegistry {
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

impl ServerRegistry {
    /// Registered server names, sorted for stable iteration order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.servers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Launch description for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Executable to run (e.g., "python3", "npx").
    pub command: String,
    /// Arguments to pass to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Timeout for requests in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub transport: TransportKind,
}
