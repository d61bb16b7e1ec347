//! Agent turn loop and tool routing for Relay.

pub mod agent;
pub mod router;

pub use agent::{Agent, AgentEvent};
pub use router::ToolRouter;
