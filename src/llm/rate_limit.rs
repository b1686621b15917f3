//! Sliding-window rate limiting for outbound LLM calls.
//!
//! Provider quotas are expressed as requests per minute. This module bounds
//! outbound calls two ways at once: a trailing 60-second window cap and a
//! minimum spacing between consecutive requests. Callers reserve a slot with
//! [`RateLimiter::acquire`] and either sleep out the returned wait themselves
//! or let [`RateLimiter::wait_if_needed`] do both steps.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::time::{Duration, Instant};

/// Length of the sliding window.
const WINDOW: Duration = Duration::from_secs(60);

/// Extra pause added before retrying once a full window has drained.
const RETRY_BUFFER: Duration = Duration::from_millis(100);

/// Attempts `wait_if_needed` makes against a full window before giving up.
const MAX_WAIT_ATTEMPTS: u32 = 3;

/// The sliding window has no free slot.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Rate limit exceeded. Can retry after {:.1} seconds", .retry_after.as_secs_f64())]
pub struct RateLimitExceeded {
    /// Time until the oldest window entry expires.
    pub retry_after: Duration,
}

/// Read-only snapshot of the limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiterStatus {
    /// Requests currently occupying the window.
    pub requests_in_window: usize,

    /// Configured ceiling (0 = unlimited).
    pub max_requests_per_minute: f64,

    /// Budget left in the current window.
    pub requests_remaining: f64,

    /// Time until the oldest window entry expires (zero when empty).
    pub reset_in: Duration,

    /// Minimum spacing between consecutive requests.
    pub min_interval: Duration,
}

/// Client-side admission control over a requests-per-minute budget.
///
/// All state lives behind one mutex, so `acquire` and `status` are safe to
/// call from concurrent tasks. Timekeeping uses the runtime clock, which
/// makes throttle behavior testable under a paused clock.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests_per_minute: f64,
    min_interval: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
    /// Scheduled request timestamps inside the trailing window, oldest first.
    scheduled: VecDeque<Instant>,
    /// Most recently scheduled request (may be in the near future).
    last_scheduled: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter. Zero requests per minute disables limiting.
    pub fn new(max_requests_per_minute: f64) -> Self {
        let min_interval = if max_requests_per_minute > 0.0 {
            Duration::from_secs_f64(60.0 / max_requests_per_minute)
        } else {
            Duration::ZERO
        };

        Self {
            max_requests_per_minute,
            min_interval,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Whether this limiter throttles at all.
    pub fn is_enabled(&self) -> bool {
        self.max_requests_per_minute > 0.0
    }

    /// Configured ceiling.
    pub fn max_requests_per_minute(&self) -> f64 {
        self.max_requests_per_minute
    }

    /// Minimum spacing between consecutive requests.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserve the next request slot.
    ///
    /// Returns how long the caller must wait before issuing the request; the
    /// slot is reserved at `now + wait`, so back-to-back callers space out by
    /// at least the configured interval. Fails when the window is full.
    pub fn acquire(&self) -> Result<Duration, RateLimitExceeded> {
        if !self.is_enabled() {
            return Ok(Duration::ZERO);
        }

        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        evict(&mut state.scheduled, now);

        if state.scheduled.len() as f64 >= self.max_requests_per_minute {
            let oldest = state.scheduled.front().copied().unwrap_or(now);
            let retry_after = WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(RateLimitExceeded { retry_after });
        }

        let wait = match state.last_scheduled {
            // tokio Instants saturate, so this is max(0, last + interval - now)
            Some(last) => (last + self.min_interval).duration_since(now),
            None => Duration::ZERO,
        };

        let slot = now + wait;
        state.scheduled.push_back(slot);
        state.last_scheduled = Some(slot);
        Ok(wait)
    }

    /// Record a request that was scheduled elsewhere.
    pub fn record_request(&self, at: Option<Instant>) {
        if !self.is_enabled() {
            return;
        }

        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        evict(&mut state.scheduled, now);

        let at = at.unwrap_or(now);
        state.scheduled.push_back(at);
        state.last_scheduled = Some(at);
    }

    /// Sleep out the computed throttle delay, then record the request.
    ///
    /// A full window sleeps until the oldest slot expires and tries again, up
    /// to [`MAX_WAIT_ATTEMPTS`] times; after that the error reaches the
    /// caller, which is expected to count it against its own retry budget.
    pub async fn wait_if_needed(&self) -> Result<Duration, RateLimitExceeded> {
        let mut last_err = None;

        for attempt in 1..=MAX_WAIT_ATTEMPTS {
            match self.acquire() {
                Ok(wait) => {
                    if !wait.is_zero() {
                        log::debug!(
                            "Throttling {:.2}s to respect request spacing",
                            wait.as_secs_f64()
                        );
                        tokio::time::sleep(wait).await;
                    }
                    self.record_request(None);
                    return Ok(wait);
                }
                Err(err) => {
                    log::warn!(
                        "Rate limit window full, waiting {:.2}s for a slot (attempt {attempt})",
                        err.retry_after.as_secs_f64()
                    );
                    if attempt < MAX_WAIT_ATTEMPTS {
                        tokio::time::sleep(err.retry_after + RETRY_BUFFER).await;
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(RateLimitExceeded {
            retry_after: WINDOW,
        }))
    }

    /// Read-only snapshot for status displays.
    pub fn status(&self) -> RateLimiterStatus {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        evict(&mut state.scheduled, now);

        let in_window = state.scheduled.len();
        let reset_in = state
            .scheduled
            .front()
            .map(|oldest| (*oldest + WINDOW).duration_since(now))
            .unwrap_or(Duration::ZERO);

        RateLimiterStatus {
            requests_in_window: in_window,
            max_requests_per_minute: self.max_requests_per_minute,
            requests_remaining: (self.max_requests_per_minute - in_window as f64).max(0.0),
            reset_in,
            min_interval: self.min_interval,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(60.0)
    }
}

fn evict(scheduled: &mut VecDeque<Instant>, now: Instant) {
    while let Some(front) = scheduled.front() {
        if now.duration_since(*front) >= WINDOW {
            scheduled.pop_front();
        } else {
            break;
        }
    }
}
