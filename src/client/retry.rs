//! Retry policy for outbound calls.

use std::collections::HashSet;
use std::time::Duration;

use super::error::{ApiError, ApiErrorKind};

/// Exponential backoff policy applied to every remote call.
///
/// The wait before attempt `n + 1` is
/// `min(base_delay * backoff_multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retryable: HashSet<ApiErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            retryable: [
                ApiErrorKind::Connection,
                ApiErrorKind::Timeout,
                ApiErrorKind::RateLimit,
                ApiErrorKind::Server,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let millis = self.base_delay.as_secs_f64() * 1000.0 * factor;
        let capped = millis.min(self.max_delay.as_secs_f64() * 1000.0);
        Duration::from_millis(capped.round() as u64)
    }

    /// Whether a failure on the given (1-based) attempt earns another try.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        attempt < self.max_attempts && self.retryable.contains(&error.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(10), Duration::from_secs(10));
    }

    #[test]
    fn test_retryable_kinds() {
        let policy = RetryPolicy::default();
        let server = ApiError::from_status(500, "boom");
        let limited = ApiError::from_status(429, "slow down");
        let auth = ApiError::from_status(401, "bad key");
        let missing = ApiError::from_status(404, "gone");
        let invalid = ApiError::from_status(400, "bad body");

        assert!(policy.should_retry(&server, 1));
        assert!(policy.should_retry(&limited, 2));
        assert!(!policy.should_retry(&server, 3));
        assert!(!policy.should_retry(&auth, 1));
        assert!(!policy.should_retry(&missing, 1));
        assert!(!policy.should_retry(&invalid, 1));
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(&ApiError::from_status(503, "x"), 1));
    }
}
