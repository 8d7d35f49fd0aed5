//! Execution substrate: runs step invocations under the execution policy.
//!
//! The substrate owns everything time-related (slot scheduling, per-attempt
//! timeouts, backoff and the run deadline) so that the orchestrator's
//! decisions depend only on step outcomes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{StepId, StepInput, StepResult};
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout};

use crate::error::StepError;
use crate::policy::ExecutionPolicy;
use crate::services::StepExecutor;

/// A step invocation to schedule.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub step: StepId,
    pub input: StepInput,
}

/// End-to-end deadline of one run, issued by the substrate.
#[derive(Debug, Clone, Copy)]
pub struct RunDeadline {
    expires_at: Instant,
    budget: Duration,
}

impl RunDeadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    /// The full budget the deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Schedules step invocations with timeouts and retries.
#[async_trait]
pub trait ExecutionSubstrate: Send + Sync {
    /// Opens the deadline for a new run.
    fn start_run(&self, policy: &ExecutionPolicy) -> RunDeadline {
        RunDeadline::after(policy.deadline)
    }

    /// Runs the step to completion or until the policy gives up on it.
    async fn schedule_and_execute(
        &self,
        descriptor: StepDescriptor,
        policy: &ExecutionPolicy,
        deadline: &RunDeadline,
    ) -> Result<StepResult, StepError>;
}

/// In-process substrate backed by a [`StepExecutor`].
///
/// A semaphore stands in for worker capacity: a step waits for a free slot
/// for at most `schedule_to_start`. Slots are shared by every run using the
/// same substrate.
pub struct LocalSubstrate<E: StepExecutor> {
    executor: E,
    slots: Arc<Semaphore>,
}

impl<E: StepExecutor> LocalSubstrate<E> {
    /// Default number of step invocations allowed to run at once.
    pub const DEFAULT_SLOTS: usize = 100;

    pub fn new(executor: E) -> Self {
        Self::with_slots(executor, Self::DEFAULT_SLOTS)
    }

    pub fn with_slots(executor: E, slots: usize) -> Self {
        Self {
            executor,
            slots: Arc::new(Semaphore::new(slots.max(1))),
        }
    }

    /// Slots currently free.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

#[async_trait]
impl<E: StepExecutor> ExecutionSubstrate for LocalSubstrate<E> {
    #[tracing::instrument(skip_all, fields(step = %descriptor.step))]
    async fn schedule_and_execute(
        &self,
        descriptor: StepDescriptor,
        policy: &ExecutionPolicy,
        deadline: &RunDeadline,
    ) -> Result<StepResult, StepError> {
        let step = descriptor.step;
        let deadline_exceeded = StepError::DeadlineExceeded {
            step,
            deadline: deadline.budget(),
        };

        if deadline.is_expired() {
            return Err(deadline_exceeded);
        }
        let wait = policy.schedule_to_start.min(deadline.remaining());
        let _permit = match timeout(wait, self.slots.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) if wait < policy.schedule_to_start => {
                return Err(deadline_exceeded);
            }
            Ok(Err(_)) | Err(_) => {
                return Err(StepError::ScheduleTimeout {
                    step,
                    timeout: policy.schedule_to_start,
                });
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            if deadline.is_expired() {
                return Err(deadline_exceeded);
            }
            let budget = policy.start_to_close.min(deadline.remaining());

            metrics::counter!("saga_step_attempts_total", "step" => step.as_str()).increment(1);
            let failure = match timeout(budget, self.executor.perform(&descriptor.input)).await {
                Ok(Ok(result)) => {
                    tracing::debug!(
                        attempt,
                        resource_id = %result.resource_id,
                        "step attempt succeeded"
                    );
                    return Ok(result);
                }
                Ok(Err(source)) if !source.is_retryable() => {
                    return Err(StepError::Failed {
                        step,
                        attempts: attempt,
                        source,
                    });
                }
                Ok(Err(source)) => StepError::Failed {
                    step,
                    attempts: attempt,
                    source,
                },
                Err(_) if budget < policy.start_to_close => return Err(deadline_exceeded),
                Err(_) => StepError::Timeout {
                    step,
                    timeout: budget,
                    attempts: attempt,
                },
            };

            if !policy.retry.should_retry(attempt) {
                return Err(failure);
            }
            let delay = policy.retry.delay_for_attempt(attempt);
            if delay >= deadline.remaining() {
                return Err(failure);
            }
            tracing::warn!(attempt, ?delay, error = %failure, "step attempt failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
