//! Bounded retry policy for UI actions
//!
//! Policy values are immutable and freely copied. Classification is a
//! plain function over the crate's error type, so the policy never depends
//! on any transport's exception vocabulary.

use std::time::Duration;

use crate::error::{Error, ErrorClass};

/// Classification function: decides whether an error is worth another
/// attempt.
pub type ClassifyFn = fn(&Error) -> ErrorClass;

/// Bounded retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    classify: ClassifyFn,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first try and is clamped
    /// to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            classify: Error::class,
        }
    }

    /// Policy from the run configuration
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Replace the classification function
    pub fn with_classifier(mut self, classify: ClassifyFn) -> Self {
        self.classify = classify;
        self
    }

    /// Maximum number of attempts, first try included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classify an error under this policy
    pub fn classify(&self, error: &Error) -> ErrorClass {
        (self.classify)(error)
    }

    /// Whether another attempt may follow attempt number `attempt` failing
    /// with `error`. A fatal classification is never retried.
    pub fn permits_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt < self.max_attempts && self.classify(error) == ErrorClass::Transient
    }

    /// Delay before the attempt after `attempt` (linear in the attempt
    /// number, so later retries back off a little further).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}
