use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Attempts made before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff unit; the wait after attempt `n` is `n` units
pub const DEFAULT_DELAY_UNIT: Duration = Duration::from_millis(1000);

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_unit: DEFAULT_DELAY_UNIT,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_unit,
        }
    }

    /// Wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay_unit.saturating_mul(attempt)
    }

    /// Total time spent waiting when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_attempts.max(1)).map(|n| self.delay_after(n)).sum()
    }
}

/// All attempts failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds or the policy runs out of attempts.
///
/// The operation receives the 1-based attempt number. Every failure,
/// including the last, is followed by the policy's delay.
pub async fn retry_linear<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {}/{} failed: {}; waiting {:?}",
                    attempt, max_attempts, err, delay
                );
                sleep(delay).await;

                if attempt >= max_attempts {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                attempt += 1;
            }
        }
    }
}
