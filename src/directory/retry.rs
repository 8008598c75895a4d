//! Exponential backoff for folder-service calls.

use crate::error::{DirectoryError, DirectoryResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides which errors are worth another attempt.
pub type RetryPredicate = fn(&DirectoryError) -> bool;

/// Retry policy injected into the directory client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included (0 and 1 both mean a single attempt).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(32))
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            retryable: DirectoryError::is_transient,
        }
    }

    /// No waiting between attempts. Used by tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// `attempt` is the zero-based index of the attempt that just failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &DirectoryError) -> bool {
        attempt.saturating_add(1) < self.max_attempts && (self.retryable)(error)
    }

    /// `min(base * 2^attempt, max)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> DirectoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DirectoryResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if attempt == 0 || !(self.retryable)(&error) {
                        return Err(error);
                    }
                    warn!(operation, attempts = attempt + 1, error = %error, "Retries exhausted");
                    return Err(DirectoryError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt + 1,
                        last: Box::new(error),
                    });
                }
            }
        }
    }
}
