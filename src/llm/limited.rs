//! Retry/backoff decorator around any [`LlmClient`].
//!
//! Wraps a backend with the sliding-window [`RateLimiter`] plus an
//! exponential-backoff policy. Provider throttle failures are recognized both
//! by type (explicit 429s) and by message vocabulary, retried up to a fixed
//! attempt ceiling, and surfaced with cumulative usage counters.

use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::time::Duration;

use crate::llm::client::{LlmClient, LlmError, UsageStats};
use crate::llm::rate_limit::RateLimiter;

/// Attempts per generation call before failing permanently.
const MAX_ATTEMPTS: u32 = 5;

/// Fallback pause when the provider suggested nothing.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Provider phrasings that signal throttling, matched case-insensitively.
const RATE_LIMIT_INDICATORS: [&str; 8] = [
    "rate limit",
    "rate_limit_exceeded",
    "too many requests",
    "quota exceeded",
    "429",
    "rate-limit-exceeded",
    "request limit",
    "maximum requests",
];

/// Natural-language delay hints seen in provider error bodies.
static RETRY_AFTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"retry after (\d+(?:\.\d+)?)",
        r"retry-after:\s*(\d+(?:\.\d+)?)",
        r"try again in (\d+(?:\.\d+)?)",
        r"wait (\d+(?:\.\d+)?) seconds?",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Rate-limited wrapper over an inner LLM backend.
pub struct RateLimitedClient {
    inner: Box<dyn LlmClient>,
    limiter: RateLimiter,
    enable_backoff: bool,
    max_backoff: Duration,
    counters: Mutex<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    rate_limit_errors: u64,
    consecutive_errors: u32,
}

impl RateLimitedClient {
    pub fn new(
        inner: Box<dyn LlmClient>,
        limiter: RateLimiter,
        enable_backoff: bool,
        max_backoff: Duration,
    ) -> Self {
        Self {
            inner,
            limiter,
            enable_backoff,
            max_backoff,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// The underlying admission-control window.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Retry delay for the current failure streak.
    ///
    /// A provider-suggested delay always wins, capped at the configured
    /// maximum. With backoff enabled the fallback is `2^consecutive` seconds
    /// plus 10% jitter; disabled, a small fixed pause.
    fn backoff_delay(&self, suggested: Option<Duration>, consecutive_errors: u32) -> Duration {
        if let Some(suggested) = suggested {
            return suggested.min(self.max_backoff);
        }
        if !self.enable_backoff {
            return DEFAULT_RETRY_DELAY.min(self.max_backoff);
        }

        let base = 2f64.powi(consecutive_errors as i32);
        let with_jitter = base + base * 0.1;
        Duration::from_secs_f64(with_jitter.min(self.max_backoff.as_secs_f64()))
    }

    fn note_rate_limit_error(&self) -> u32 {
        let mut counters = self.counters.lock().unwrap();
        counters.rate_limit_errors += 1;
        counters.consecutive_errors += 1;
        counters.consecutive_errors
    }

    fn looks_rate_limited(&self, err: &LlmError) -> bool {
        err.is_rate_limit() || message_indicates_rate_limit(&err.to_string())
    }
}

#[async_trait]
impl LlmClient for RateLimitedClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        self.counters.lock().unwrap().total_requests += 1;

        for attempt in 1..=MAX_ATTEMPTS {
            // Window admission first; a persistently full window is treated
            // like any other throttle failure.
            if let Err(exceeded) = self.limiter.wait_if_needed().await {
                let consecutive = self.note_rate_limit_error();
                if attempt == MAX_ATTEMPTS {
                    return Err(LlmError::RateLimited {
                        message: format!(
                            "Rate limit exceeded after {MAX_ATTEMPTS} attempts: {exceeded}"
                        ),
                        retry_after: None,
                    });
                }
                let delay = self.backoff_delay(Some(exceeded.retry_after), consecutive);
                log::warn!(
                    "Rate limit window full (attempt {attempt}/{MAX_ATTEMPTS}), retrying in {:.1}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            match self.inner.generate(prompt, system_prompt).await {
                Ok(text) => {
                    self.counters.lock().unwrap().consecutive_errors = 0;
                    return Ok(text);
                }
                Err(err) if self.looks_rate_limited(&err) => {
                    let consecutive = self.note_rate_limit_error();
                    if attempt == MAX_ATTEMPTS {
                        let message = if err.is_rate_limit() {
                            format!("Rate limit exceeded after {MAX_ATTEMPTS} attempts: {err}")
                        } else {
                            format!("API rate limit exceeded after {MAX_ATTEMPTS} attempts: {err}")
                        };
                        return Err(LlmError::RateLimited {
                            message,
                            retry_after: None,
                        });
                    }
                    let suggested = err
                        .retry_after()
                        .or_else(|| extract_retry_after(&err.to_string()));
                    let delay = self.backoff_delay(suggested, consecutive);
                    log::warn!(
                        "Provider throttled request (attempt {attempt}/{MAX_ATTEMPTS}), retrying in {:.1}s: {err}",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(LlmError::RateLimited {
            message: format!("Rate limit exceeded after {MAX_ATTEMPTS} attempts"),
            retry_after: None,
        })
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn stats(&self) -> Option<UsageStats> {
        let counters = self.counters.lock().unwrap();
        let error_rate = if counters.total_requests > 0 {
            counters.rate_limit_errors as f64 / counters.total_requests as f64
        } else {
            0.0
        };

        Some(UsageStats {
            total_requests: counters.total_requests,
            rate_limit_errors: counters.rate_limit_errors,
            error_rate,
            window: self.limiter.status(),
        })
    }
}

/// Case-insensitive scan for the known throttle vocabulary.
pub fn message_indicates_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

/// Pull a suggested delay out of a provider error message, if any.
pub fn extract_retry_after(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    for pattern in RETRY_AFTER_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&lower) {
            if let Some(value) = captures.get(1) {
                if let Ok(secs) = value.as_str().parse::<f64>() {
                    return Some(Duration::from_secs_f64(secs));
                }
            }
        }
    }
    None
}
