//! Retry budget for failed job attempts.

use serde::{Deserialize, Serialize};

use crate::job::DeliveryAttempt;

/// How a failed attempt is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Leave the delivery unacknowledged; the queue redelivers after the
    /// visibility timeout.
    Transient,
    /// Budget exhausted: write a failure status, then acknowledge.
    Terminal,
}

/// Retry policy keyed purely on the queue's delivery count.
///
/// Wall-clock time never enters the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Deliveries allowed before a failure becomes terminal (>= 1).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Check if another delivery is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: DeliveryAttempt) -> bool {
        attempt.get() < self.max_attempts
    }

    pub fn classify(&self, attempt: DeliveryAttempt) -> FailureDisposition {
        if self.should_retry(attempt) {
            FailureDisposition::Transient
        } else {
            FailureDisposition::Terminal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_respects_max_attempts() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.classify(DeliveryAttempt::new(1)), FailureDisposition::Transient);
        assert_eq!(policy.classify(DeliveryAttempt::new(2)), FailureDisposition::Transient);
        assert_eq!(policy.classify(DeliveryAttempt::new(3)), FailureDisposition::Terminal);
        assert_eq!(policy.classify(DeliveryAttempt::new(7)), FailureDisposition::Terminal);
    }

    #[test]
    fn single_attempt_policy_is_always_terminal() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.classify(DeliveryAttempt::FIRST), FailureDisposition::Terminal);
    }
}
