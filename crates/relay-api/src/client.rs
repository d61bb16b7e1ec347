//! Gemini API client.

use std::time::Duration;

use relay_types::{ApiError, ChatReply, ChatRequest};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::retry::{RetryConfig, calculate_delay, is_retryable};
use crate::wire;

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl GeminiClient {
    /// Create a new API client.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Send one completion request and return the model's reply.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| ApiError::Auth {
                message: "Invalid API key format".into(),
            })?,
        );

        let body = serde_json::to_string(&wire::build_request(request)).map_err(|e| {
            ApiError::BadRequest {
                message: format!("Failed to serialize request: {e}"),
            }
        })?;

        for attempt in 0..=self.retry_config.max_retries {
            tracing::debug!(
                "POST {url} (attempt {}/{})",
                attempt + 1,
                self.retry_config.max_retries + 1
            );

            let result = self
                .http
                .post(&url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let err = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
                        return wire::parse_reply(&json);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    let err = classify_error(status.as_u16(), &body_text, retry_after);

                    if !is_retryable(&err) || attempt == self.retry_config.max_retries {
                        return Err(err);
                    }
                    err
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        ApiError::Timeout
                    } else {
                        ApiError::Network(e.to_string())
                    };
                    if attempt == self.retry_config.max_retries {
                        return Err(err);
                    }
                    err
                }
            };

            let retry_after = match &err {
                ApiError::RateLimited { retry_after_ms } => *retry_after_ms,
                _ => None,
            };
            let delay = calculate_delay(&self.retry_config, attempt, retry_after);
            tracing::warn!(
                "Retryable API error (attempt {}/{}): {err}. Retrying in {delay}ms...",
                attempt + 1,
                self.retry_config.max_retries,
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        // Unreachable: the loop always returns on the last attempt
        unreachable!("retry loop should have returned")
    }
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        // Gemini reports a bad or missing key as 403 PERMISSION_DENIED.
        401 | 403 => ApiError::Auth { message },
        400 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        _ => ApiError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_retry_after_integer() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(5000));
    }

    #[test]
    fn parse_retry_after_fractional() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(1500));
    }

    #[test]
    fn parse_retry_after_missing_or_invalid() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn classify_403_as_auth() {
        let err = classify_error(
            403,
            r#"{"error":{"message":"API key not valid","status":"PERMISSION_DENIED"}}"#,
            None,
        );
        match err {
            ApiError::Auth { message } => assert!(message.contains("API key not valid")),
            other => panic!("Expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn classify_429_keeps_retry_after() {
        let err = classify_error(429, "{}", Some(3000));
        match err {
            ApiError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, Some(3000)),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn classify_500_as_server() {
        let err = classify_error(500, r#"{"error":{"message":"boom"}}"#, None);
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Server, got {other:?}"),
        }
    }

    #[test]
    fn classify_unparseable_body_uses_raw_text() {
        let err = classify_error(400, "not json", None);
        match err {
            ApiError::BadRequest { message } => assert_eq!(message, "not json"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }
}
