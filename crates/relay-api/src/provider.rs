//! Gemini provider implementation.

use crate::client::GeminiClient;
use crate::retry::RetryConfig;
use relay_types::provider::Provider;
use relay_types::{ApiError, ChatReply, ChatRequest};
use std::future::Future;
use std::pin::Pin;

/// Gemini `generateContent` provider.
///
/// Wraps `GeminiClient` and implements the `Provider` trait, delegating all
/// calls to the underlying client. Retry logic stays in `GeminiClient`.
#[derive(Clone)]
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: GeminiClient::new(api_key, base_url)?,
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }
}

impl Provider for GeminiProvider {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, ApiError>> + Send + 'a>> {
        Box::pin(self.client.complete(request))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
