//! Execution policy applied uniformly to every step invocation.
//!
//! The orchestrator only declares these values; the execution substrate is
//! what enforces them around each call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff between attempts of one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after every attempt.
    pub backoff_coefficient: f64,
    /// Upper bound for a single delay.
    pub maximum_interval: Duration,
    /// Total attempts, including the first one.
    pub maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
            maximum_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    ///
    /// `initial_interval * backoff_coefficient ^ (attempt - 1)`, capped at
    /// `maximum_interval`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = delay.min(self.maximum_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.maximum_interval
        }
    }

    /// Returns true if another attempt may follow the given one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.maximum_attempts.max(1)
    }
}

/// Timeouts and retry policy for every step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Maximum duration of a single attempt.
    pub start_to_close: Duration,
    /// Maximum time a step may wait for a worker before starting.
    pub schedule_to_start: Duration,
    /// End-to-end deadline for the whole pipeline.
    pub deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::from_timeouts(Duration::from_secs(10), Duration::from_secs(30))
    }
}

impl ExecutionPolicy {
    /// Derives the policy from the per-call and per-transaction timeouts.
    pub fn from_timeouts(call_timeout: Duration, transaction_timeout: Duration) -> Self {
        Self {
            start_to_close: call_timeout,
            schedule_to_start: call_timeout,
            deadline: transaction_timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
