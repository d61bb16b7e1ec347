//! MCP (Model Context Protocol) client implementation for Relay.
//!
//! Supports stdio-based MCP servers that communicate via newline-delimited
//! JSON-RPC 2.0 messages. Each configured server is spawned as a child
//! process, initialized with a handshake, and queried for its tools,
//! resources, and prompts.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod manager;
pub mod session;
mod transport;

pub use client::{McpClient, PromptArgument, PromptInfo, ResourceInfo, ToolInfo, ToolOutcome};
pub use config::{ServerConfig, ServerRegistry, TransportKind};
pub use error::McpError;
pub use manager::McpManager;
pub use session::{BoxFuture, ServerSession, SessionSource};
