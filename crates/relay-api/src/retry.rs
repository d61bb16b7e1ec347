//! Retry with exponential backoff for API requests.

use rand::Rng;
use relay_types::ApiError;

/// Configuration for retry behavior on transient API errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        }
    }
}

/// Returns `true` if the error is transient and the request should be retried.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}

/// Delay in milliseconds before the next retry attempt.
///
/// A server-provided `Retry-After` value wins (clamped to `max_delay_ms`);
/// otherwise exponential backoff with ±25% jitter, clamped to `max_delay_ms`.
pub fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
    if let Some(server_delay) = retry_after_ms {
        return server_delay.min(config.max_delay_ms);
    }

    let base = config.initial_delay_ms as f64 * config.backoff_factor.powi(attempt as i32);
    let clamped = base.min(config.max_delay_ms as f64);
    let jittered = clamped * rand::rng().random_range(0.75..=1.25);

    (jittered as u64).min(config.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 60_000);
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(is_retryable(&ApiError::RateLimited {
            retry_after_ms: None,
        }));
        assert!(is_retryable(&ApiError::Server {
            status: 503,
            message: "unavailable".into(),
        }));
        assert!(is_retryable(&ApiError::Network("connection reset".into())));
        assert!(is_retryable(&ApiError::Timeout));
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!is_retryable(&ApiError::Auth {
            message: "invalid key".into(),
        }));
        assert!(!is_retryable(&ApiError::BadRequest {
            message: "bad schema".into(),
        }));
        assert!(!is_retryable(&ApiError::InvalidResponse("no candidates".into())));
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        };

        // base 1000 * 2^n, each with ±25% jitter
        let delay0 = calculate_delay(&config, 0, None);
        assert!((750..=1250).contains(&delay0), "delay0={delay0}");
        let delay2 = calculate_delay(&config, 2, None);
        assert!((3000..=5000).contains(&delay2), "delay2={delay2}");
    }

    #[test]
    fn retry_after_wins_and_is_capped() {
        let config = RetryConfig {
            max_delay_ms: 10_000,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_delay(&config, 0, Some(5000)), 5000);
        assert_eq!(calculate_delay(&config, 0, Some(30_000)), 10_000);
    }

    #[test]
    fn backoff_capped_at_max() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_factor: 10.0,
        };
        assert!(calculate_delay(&config, 5, None) <= config.max_delay_ms);
    }
}
