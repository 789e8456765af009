//! Retry with exponential backoff for outbound calls.
//!
//! Every delivery made by the scheduler or by admin actions goes through
//! [`RetryPolicy::run`]. The delay after the `n`-th failed attempt (0-based)
//! is `base_delay * 2^n`; there is no jitter and no sleep after the last
//! attempt.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fallback used when a call site passes a zero base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Delay to wait after the failed attempt with the given 0-based index.
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        backoff_delay(self.base_delay, attempt_index)
    }

    /// Run `op` under this policy.
    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        retry_with_backoff(self.attempts, self.base_delay, op).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

fn backoff_delay(base_delay: Duration, attempt_index: u32) -> Duration {
    let base = if base_delay.is_zero() {
        DEFAULT_BASE_DELAY
    } else {
        base_delay
    };
    // 2^31 * base is already far beyond any sane budget
    base.saturating_mul(1u32 << attempt_index.min(31))
}

/// Invoke `op` up to `attempts` times (at least once).
///
/// Returns the first success, or the error of the last attempt once the
/// budget is exhausted. Once started the sequence always runs to completion.
pub async fn retry_with_backoff<F, Fut, T, E>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 >= attempts {
                    return Err(e);
                }
                let delay = backoff_delay(base_delay, attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
