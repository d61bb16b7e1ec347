//! Gemini `generateContent` API client for Relay.

mod client;
mod provider;
mod retry;
mod wire;

pub use client::{GeminiClient, DEFAULT_BASE_URL};
pub use provider::GeminiProvider;
pub use retry::RetryConfig;
