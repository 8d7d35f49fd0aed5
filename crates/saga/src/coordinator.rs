//! Saga coordinator: a stack of compensations unwound in reverse on failure.

use std::future::Future;
use std::sync::Arc;

use common::{ResourceId, StepId};

use crate::error::{CompensationFailure, SagaError, ServiceError, StepError};
use crate::services::Compensator;
use crate::state::SagaState;

/// Undo of one committed step.
///
/// Carries everything it needs, so running it never reaches back into the
/// orchestrator that registered it.
#[derive(Clone)]
pub struct Compensation {
    step: StepId,
    base_url: String,
    resource_id: ResourceId,
    compensator: Arc<dyn Compensator>,
}

impl Compensation {
    pub fn new(
        step: StepId,
        base_url: impl Into<String>,
        resource_id: ResourceId,
        compensator: Arc<dyn Compensator>,
    ) -> Self {
        Self {
            step,
            base_url: base_url.into(),
            resource_id,
            compensator,
        }
    }

    pub fn step(&self) -> StepId {
        self.step
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Invokes the compensator once.
    pub async fn run(&self) -> Result<(), ServiceError> {
        self.compensator
            .undo(&self.base_url, &self.resource_id)
            .await
    }
}

impl std::fmt::Debug for Compensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compensation")
            .field("step", &self.step)
            .field("base_url", &self.base_url)
            .field("resource_id", &self.resource_id)
            .finish_non_exhaustive()
    }
}

/// Compensation stack for one orchestration run.
///
/// Compensations are appended in step completion order and popped from the
/// end by [`Saga::fail`], so each one runs at most once. A saga is owned by a
/// single run and is spent once it reaches a terminal state.
#[derive(Debug, Default)]
pub struct Saga {
    compensations: Vec<Compensation>,
    state: SagaState,
}

impl Saga {
    /// Creates an empty saga.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Number of compensations registered and not yet unwound.
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Registers a compensation to run if the saga fails.
    ///
    /// A spent saga accepts nothing: the compensation is dropped with a warning.
    pub fn add(&mut self, compensation: Compensation) {
        if !self.state.can_run() {
            tracing::warn!(
                state = %self.state,
                step = %compensation.step,
                resource_id = %compensation.resource_id,
                "compensation offered to a spent saga, ignoring"
            );
            return;
        }
        tracing::debug!(
            step = %compensation.step,
            resource_id = %compensation.resource_id,
            "compensation registered"
        );
        self.compensations.push(compensation);
    }

    /// Runs one step and registers its compensation on success.
    ///
    /// `compensation` sees the step's output and returns `None` when there is
    /// nothing to undo. If the step fails, the saga is unwound immediately and
    /// the aggregate error is returned. A spent saga never polls `step` and
    /// returns [`SagaError::Aborted`].
    pub async fn execute_step<T, Fut, C>(
        &mut self,
        step: Fut,
        compensation: C,
    ) -> Result<T, SagaError>
    where
        Fut: Future<Output = Result<T, StepError>>,
        C: FnOnce(&T) -> Option<Compensation>,
    {
        if !self.state.can_run() {
            tracing::warn!(state = %self.state, "step offered to a spent saga, refusing");
            return Err(SagaError::Aborted);
        }
        self.state = SagaState::Running;

        match step.await {
            Ok(output) => {
                if let Some(action) = compensation(&output) {
                    self.add(action);
                }
                Ok(output)
            }
            Err(cause) => Err(self.fail(Some(cause)).await),
        }
    }

    /// Unwinds registered compensations in reverse order.
    ///
    /// Every compensation is attempted exactly once; failures are recorded
    /// and the unwind continues. The returned error wraps `cause` when given.
    /// Without a cause, the first compensation failure is returned, or
    /// [`SagaError::Aborted`] if there was none.
    pub async fn fail(&mut self, cause: Option<StepError>) -> SagaError {
        if self.state.can_compensate() {
            self.state = SagaState::Compensating;
        }
        if let Some(cause) = &cause {
            tracing::warn!(
                step = %cause.step(),
                kind = cause.kind(),
                error = %cause,
                pending = self.compensations.len(),
                "saga step failed, compensating"
            );
        }

        let mut failures = Vec::new();
        while let Some(compensation) = self.compensations.pop() {
            metrics::counter!("saga_compensations_total").increment(1);
            match compensation.run().await {
                Ok(()) => {
                    tracing::info!(
                        step = %compensation.step,
                        resource_id = %compensation.resource_id,
                        "compensation completed"
                    );
                }
                Err(source) => {
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::warn!(
                        step = %compensation.step,
                        resource_id = %compensation.resource_id,
                        error = %source,
                        "compensation failed, continuing unwind"
                    );
                    failures.push(CompensationFailure {
                        step: compensation.step,
                        resource_id: compensation.resource_id,
                        source,
                    });
                }
            }
        }
        self.state = SagaState::Failed;

        match cause {
            Some(cause) => SagaError::Failed {
                cause,
                compensation_errors: failures,
            },
            None => failures
                .into_iter()
                .next()
                .map_or(SagaError::Aborted, SagaError::Compensation),
        }
    }

    /// Marks the saga as successfully finished and drops its compensations.
    ///
    /// Has no effect on a saga that already failed.
    pub fn complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.compensations.clear();
        self.state = SagaState::Completed;
    }
}
