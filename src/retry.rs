//! Bounded retry policy.
//!
//! Cleanup must never retry forever: a flaky provider would otherwise hang
//! the whole pipeline. [`RetryPolicy`] caps the number of attempts and waits a
//! fixed delay between them.

use std::thread::sleep;
use std::time::Duration;

/// Fixed-delay retry policy with a hard attempt cap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on `attempt` (1-based).
    Succeeded {
        /// Attempt that produced the value.
        attempt: u32,
        /// Value returned by the operation.
        value: T,
    },
    /// Every permitted attempt failed, or a non-retryable error stopped the
    /// loop early.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        last_error: E,
    },
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// One attempt plus exactly one retry after `delay`.
    #[must_use]
    pub fn single_retry(delay: Duration) -> Self {
        Self::new(2, delay)
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `operation` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number.
    #[must_use]
    pub fn run<T, E>(&self, operation: impl FnMut(u32) -> Result<T, E>) -> RetryOutcome<T, E> {
        self.run_while(|_| true, operation)
    }

    /// Like [`RetryPolicy::run`], but stops as soon as `is_retryable` rejects
    /// an error.
    #[must_use]
    pub fn run_while<T, E>(
        &self,
        is_retryable: impl Fn(&E) -> bool,
        mut operation: impl FnMut(u32) -> Result<T, E>,
    ) -> RetryOutcome<T, E> {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return RetryOutcome::Succeeded { attempt, value },
                Err(err) if attempt >= self.max_attempts || !is_retryable(&err) => {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: err,
                    };
                }
                Err(_) => {
                    if !self.delay.is_zero() {
                        sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl<T, E> RetryOutcome<T, E> {
    /// Converts the outcome into a plain `Result`, dropping attempt counts.
    ///
    /// # Errors
    ///
    /// Returns the last error when every attempt failed.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}
