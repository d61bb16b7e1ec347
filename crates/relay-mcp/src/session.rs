//! Uniform session contract over a connected server.
//!
//! Every server, whatever its transport, exposes the same capability surface:
//! list tools, list resources, list prompts, fetch a resource, render a
//! prompt. Callers that iterate heterogeneous servers (listings, prompt and
//! resource commands) program against this trait; `McpClient` is the stdio
//! adapter.

use crate::client::{McpClient, PromptInfo, ResourceInfo, ToolInfo};
use crate::error::McpError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future used by the dyn-compatible session trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The capability surface of one connected server.
pub trait ServerSession: Send + Sync {
    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolInfo>, McpError>>;

    fn list_resources(&self) -> BoxFuture<'_, Result<Vec<ResourceInfo>, McpError>>;

    fn list_prompts(&self) -> BoxFuture<'_, Result<Vec<PromptInfo>, McpError>>;

    fn get_resource<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<String, McpError>>;

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, McpError>>;

    /// Release the session, shutting its connection down.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Hands out scoped sessions by server name. `McpManager` is the live
/// implementation; tests drive the dispatcher with stubs.
pub trait SessionSource: Send + Sync {
    /// All registered server names, whether or not the server is healthy.
    fn server_names(&self) -> Vec<String>;

    /// Open a scoped session to one named server.
    fn open_session<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn ServerSession>, McpError>>;
}

impl ServerSession for McpClient {
    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolInfo>, McpError>> {
        Box::pin(McpClient::list_tools(self))
    }

    fn list_resources(&self) -> BoxFuture<'_, Result<Vec<ResourceInfo>, McpError>> {
        Box::pin(McpClient::list_resources(self))
    }

    fn list_prompts(&self) -> BoxFuture<'_, Result<Vec<PromptInfo>, McpError>> {
        Box::pin(McpClient::list_prompts(self))
    }

    fn get_resource<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<String, McpError>> {
        Box::pin(McpClient::get_resource(self, uri))
    }

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, McpError>> {
        Box::pin(McpClient::get_prompt(self, name, arguments))
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move { (*self).shutdown().await })
    }
}
