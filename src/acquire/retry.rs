//! Retry policy: decides whether a failed attempt is followed by another.

use std::num::NonZeroU32;

use crate::error::FetchErrorKind;

/// Default number of attempts per light curve.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(2) {
    Some(value) => value,
    None => NonZeroU32::MIN,
};

/// Attempt budget for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
}

/// Verdict on a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Invalidate resolver state and try again.
    Retry,
    /// Stop and report the failure.
    GiveUp,
}

impl RetryPolicy {
    /// Policy allowing at most `max_attempts` tries.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    /// Total number of tries permitted.
    #[must_use]
    pub const fn max_attempts(self) -> u32 {
        self.max_attempts.get()
    }

    /// Decides what follows failure `kind` on 1-based attempt `attempt`.
    ///
    /// Only transient failures are retried, and only while the budget lasts.
    #[must_use]
    pub const fn after_failure(self, attempt: u32, kind: FetchErrorKind) -> RetryDecision {
        if kind.is_retryable() && attempt < self.max_attempts.get() {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
