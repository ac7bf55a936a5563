//! Bounded retry with a fixed inter-attempt delay.
//!
//! The refiner retries each (text, schema) conversion with the same inputs on
//! every attempt — no prompt mutation, no exponential backoff. Each failed
//! attempt is logged; the last error is surfaced once the budget is spent.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry policy: a bounded number of attempts separated by a fixed delay.
///
/// # Example
///
/// ```
/// use refinery::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (minimum 1).
    pub max_attempts: usize,
    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
    /// Default inter-attempt delay.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    /// A policy with `max_attempts` attempts separated by `delay`.
    #[must_use]
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that tries exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
///
/// Each failed attempt is logged at `warn`; the fixed delay is slept between
/// attempts but not after the last one. A failure that is not
/// [retryable](Error::retryable) (bad configuration, caller contract
/// violation) aborts the loop immediately without consuming further attempts.
/// On exhaustion the error from the final attempt is returned.
///
/// # Errors
///
/// Returns the last attempt's error once all attempts have failed, or the
/// first non-retryable error encountered.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.retryable() => {
                tracing::warn!(attempt, %error, "non-retryable failure, aborting");
                return Err(error);
            }
            Err(error) => {
                tracing::warn!(attempt, max_attempts, %error, "refinement attempt failed");
                last_error = Some(error);
                if attempt < max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::collaborator("retry loop made no attempts")))
}
