//! Shared types and error hierarchy for Relay.

pub mod error;
pub mod message;
pub mod provider;
mod util;

pub use error::{ApiError, ConfigError, RelayError};
pub use message::*;
pub use provider::{ChatReply, ChatRequest, Provider, ToolDefinition};
pub use util::truncate_str;
