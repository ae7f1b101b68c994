//! Exponential backoff for failed forecast fetches.
//!
//! Only transport failures and empty responses are retried. When the attempt
//! ceiling is reached the state resets and the next hourly refresh takes over.

use std::time::Duration;

pub const MAX_RETRY_ATTEMPTS: u32 = 5;
pub const INITIAL_RETRY_DELAY_SECS: u64 = 30;
pub const MAX_RETRY_DELAY_SECS: u64 = 600;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(INITIAL_RETRY_DELAY_SECS),
            max_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
            max_attempts: MAX_RETRY_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Where the fetcher is in its retry cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt_count: u32,
    pub delay_seconds: u64,
    pub is_retrying: bool,
}

/// What to do after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Arm a retry timer for `info.delay`.
    Retry(RetryInfo),
    /// Ceiling reached; state has been reset.
    Exhausted { attempts: u32 },
}

/// Retry details handed to the renderer alongside an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryInfo {
    /// 1-based number of the retry that is scheduled.
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl std::fmt::Display for RetryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retrying in {}s (attempt {}/{})",
            self.delay.as_secs(),
            self.attempt,
            self.max_attempts
        )
    }
}

impl RetryState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }

    /// Advance the state after a retryable failure.
    pub fn on_failure(&mut self, policy: &RetryPolicy) -> RetryDecision {
        if self.attempt_count >= policy.max_attempts {
            let attempts = self.attempt_count;
            self.reset();
            return RetryDecision::Exhausted { attempts };
        }

        let delay = policy.delay_for_attempt(self.attempt_count);
        self.attempt_count += 1;
        self.delay_seconds = delay.as_secs();
        self.is_retrying = true;

        RetryDecision::Retry(RetryInfo {
            attempt: self.attempt_count,
            max_attempts: policy.max_attempts,
            delay,
        })
    }
}
