//! Core LLM client trait and error types

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::rate_limit::RateLimiterStatus;

/// Stateless text-generation client - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single generation request (blocking until complete)
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Provider/model label for logs and status output
    fn model(&self) -> &str;

    /// Cumulative usage counters, for clients that track them
    fn stats(&self) -> Option<UsageStats> {
        None
    }
}

/// Usage counters reported by the rate-limited client
#[derive(Debug, Clone)]
pub struct UsageStats {
    /// Generation calls accepted (not individual retry attempts)
    pub total_requests: u64,

    /// Rate-limit failures observed across all attempts
    pub rate_limit_errors: u64,

    /// rate_limit_errors / total_requests
    pub error_rate: f64,

    /// Current sliding-window snapshot
    pub window: RateLimiterStatus,
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// True for failures the provider explicitly marked as throttling
    pub fn is_rate_limit(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status == 429,
            _ => false,
        }
    }

    /// Provider-suggested retry delay, when one was reported
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display() {
        let err = LlmError::RateLimited {
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.to_string(), "Rate limited: slow down");
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_api_429_is_rate_limit() {
        let err = LlmError::Api {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_api_500_is_not_rate_limit() {
        let err = LlmError::Api {
            status: 500,
            message: "Internal error".to_string(),
        };
        assert!(!err.is_rate_limit());
    }

    #[test]
    fn test_invalid_response_is_not_rate_limit() {
        let err = LlmError::InvalidResponse("empty choices".to_string());
        assert!(!err.is_rate_limit());
        assert_eq!(err.to_string(), "Invalid response: empty choices");
    }
}
