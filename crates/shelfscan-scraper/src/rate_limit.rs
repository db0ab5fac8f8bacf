//! Rate limiting and retry utilities.
//!
//! Two layers live here. [`retry_with_backoff`] retries a single HTTP request
//! on transient failures (429, 5xx, network errors) inside the fetcher.
//! [`RateLimiter`] paces whole page requests across a run: a jittered delay
//! between requests that grows with consecutive errors.

use std::future::Future;
use std::time::{Duration, Instant};

use shelfscan_core::AppConfig;

use crate::error::FetchError;

/// Upper bound on any single inter-request delay, backoff included.
const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`FetchError::RateLimited`]: HTTP 429; the server has asked us to back off.
/// - [`FetchError::Http`] / [`FetchError::Timeout`]: network-level failure.
/// - [`FetchError::Status`] with a 5xx code.
///
/// Everything else (4xx, bot challenges, oversize bodies) is returned as-is.
fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::RateLimited { .. } | FetchError::Http(_) | FetchError::Timeout { .. } => true,
        FetchError::Status { status, .. } => (500..600).contains(status),
        _ => false,
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On a retriable error the function sleeps for `backoff_base_ms * 2^attempt`
/// milliseconds and tries again, up to `max_retries` additional attempts after
/// the first try. If all retries are exhausted the last error is returned.
///
/// Non-retriable errors are returned immediately without sleeping or retrying.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        let delay_ms = backoff_base_ms.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %last_err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

/// Pacing parameters for a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub requests_per_second: f64,
    pub backoff_factor: f64,
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            requests_per_second: 1.0,
            backoff_factor: 2.0,
            max_retries: 3,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            requests_per_second: config.requests_per_second,
            backoff_factor: config.backoff_factor,
            max_retries: config.max_retries,
        }
    }

    /// No pacing at all. Used by tests and local fixtures.
    #[must_use]
    pub fn unthrottled() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            requests_per_second: f64::INFINITY,
            backoff_factor: 1.0,
            max_retries: 3,
        }
    }
}

/// Adaptive per-run request pacer.
///
/// Owned by exactly one scrape run; not shared across tasks.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_request: Option<Instant>,
    consecutive_errors: u32,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_request: None,
            consecutive_errors: 0,
        }
    }

    /// Sleeps until enough time has passed since the previous request, then
    /// stamps the current time as the start of the next one.
    pub async fn wait(&mut self) {
        let delay = self.next_delay(rand::random::<f64>());
        if let Some(last) = self.last_request {
            let remaining = delay.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                tracing::debug!(
                    remaining_ms = remaining.as_millis(),
                    consecutive_errors = self.consecutive_errors,
                    "rate limiting"
                );
                tokio::time::sleep(remaining).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// Delay before the next request, given a jitter sample in `[0, 1)`.
    ///
    /// The base window is `[max(1/rps, min_delay), max_delay]`; consecutive
    /// errors multiply the sampled delay by `backoff_factor^errors`, capped
    /// at 60 seconds.
    fn next_delay(&self, jitter: f64) -> Duration {
        let per_request = if self.config.requests_per_second.is_finite()
            && self.config.requests_per_second > 0.0
        {
            1.0 / self.config.requests_per_second
        } else {
            0.0
        };
        let low = per_request.max(self.config.min_delay.as_secs_f64());
        let high = self.config.max_delay.as_secs_f64().max(low);
        let mut secs = low + jitter.clamp(0.0, 1.0) * (high - low);

        if self.consecutive_errors > 0 {
            let exponent = i32::try_from(self.consecutive_errors).unwrap_or(i32::MAX);
            secs *= self.config.backoff_factor.powi(exponent);
        }

        let secs = secs.min(MAX_BACKOFF_DELAY.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(MAX_BACKOFF_DELAY)
    }

    /// A successful request relaxes the backoff by one step.
    pub fn report_success(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_sub(1);
    }

    pub fn report_error(&mut self) {
        self.consecutive_errors += 1;
        tracing::warn!(
            consecutive_errors = self.consecutive_errors,
            max_retries = self.config.max_retries,
            "request failed"
        );
    }

    /// `true` while the error streak is below the configured retry budget.
    #[must_use]
    pub fn should_retry(&self) -> bool {
        self.consecutive_errors < self.config.max_retries
    }

    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Raises the lower bound of the delay window, e.g. to honor a
    /// robots.txt `Crawl-delay`. Never lowers it.
    pub fn raise_min_delay(&mut self, delay: Duration) {
        if delay > self.config.min_delay {
            self.config.min_delay = delay;
        }
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.config.min_delay
    }

    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.last_request = None;
    }
}
