//! Bounded retry with exponential backoff
//!
//! Wraps one fallible async operation, typically the remote change poll. The
//! runner governs attempt count and inter-attempt spacing only; cancelling or
//! timing out an in-flight attempt is the operation's own responsibility.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Attempt limit and backoff base for one retried operation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (1-based), doubling per attempt
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `op` up to `max_attempts` times.
    ///
    /// Returns the first success immediately. Each failure is reported before
    /// the backoff sleep; the last error is re-raised unchanged once attempts
    /// are exhausted. No backoff state survives between calls.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    let delay = self.backoff_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation_name, attempt, attempts, err, delay
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; giving up",
                        operation_name, attempt, attempts, err
                    );
                    return Err(err);
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}
