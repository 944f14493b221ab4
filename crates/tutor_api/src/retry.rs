//! Backoff policy for idempotent conversation reads.
//!
//! Message posts are never retried here; only `GET` requests go through this
//! policy.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// How many times, and how patiently, a failed read is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound for any single backoff sleep.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// True while `attempt` (zero-based) still leaves a retry in the budget.
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Sleep before the retry that follows `attempt`: doubling from the base
    /// delay, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

fn transient_text_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(
            r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|timed?.?out",
        )
        .expect("retry regex must compile")
    })
}

/// Whether a failed response looks transient enough to repeat a read.
pub fn is_transient_failure(status: u16, body: &str) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504) || transient_text_regex().is_match(body)
}
