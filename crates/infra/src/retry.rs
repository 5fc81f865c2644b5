//! Bounded retry for transient transport failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry budget for a single queue/storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    /// Total tries including the first (>= 1).
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl TransportRetry {
    /// No waiting between tries; for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Exponential backoff: base * 2^(attempt-1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let pow = 1u32 << attempt.saturating_sub(1).min(10);
        let ms = self.base_backoff.as_millis().saturating_mul(pow as u128);
        Duration::from_millis(ms.min(self.max_backoff.as_millis()) as u64)
    }

    /// Run `op` until it succeeds or the budget is spent; returns the last error.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: core::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(operation, attempt, max_attempts = max, error = %err, ?delay, "transient transport error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
