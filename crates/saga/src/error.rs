//! Saga error types.
//!
//! Three layers: [`ServiceError`] is what an external service reports for a
//! single call, [`StepError`] is why a step failed once the substrate gave up
//! on it, and [`SagaError`] is the aggregate the orchestrator hands back.

use std::time::Duration;

use common::{Method, ResourceId, StepId};
use thiserror::Error;

/// Errors reported by a step executor or compensator for one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Update or delete was requested without a resource id.
    #[error("resource_id required for {method}")]
    MissingResourceId { method: Method },

    /// The service does not support the requested operation.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The service answered with a non-2xx status.
    #[error("external API error: {status} {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Precondition and programming errors fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ServiceError::MissingResourceId { .. } | ServiceError::UnsupportedMethod(_)
        )
    }
}

/// The cause of a step failure, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// Update or delete without the id of the resource to change.
    #[error("step '{step}': resource id required for {method}")]
    MissingResourceId { step: StepId, method: Method },

    /// Every attempt ran past the per-call timeout.
    #[error("step '{step}' timed out after {timeout:?} ({attempts} attempt(s))")]
    Timeout {
        step: StepId,
        timeout: Duration,
        attempts: u32,
    },

    /// The step could not be started within the scheduling timeout.
    #[error("step '{step}' was not started within {timeout:?}")]
    ScheduleTimeout { step: StepId, timeout: Duration },

    /// The end-to-end deadline of the run was used up.
    #[error("step '{step}' exceeded the pipeline deadline of {deadline:?}")]
    DeadlineExceeded { step: StepId, deadline: Duration },

    /// The external call failed and was not (or no longer) retried.
    #[error("step '{step}' failed after {attempts} attempt(s): {source}")]
    Failed {
        step: StepId,
        attempts: u32,
        #[source]
        source: ServiceError,
    },
}

impl StepError {
    /// The step that failed.
    pub fn step(&self) -> StepId {
        match self {
            StepError::MissingResourceId { step, .. }
            | StepError::Timeout { step, .. }
            | StepError::ScheduleTimeout { step, .. }
            | StepError::DeadlineExceeded { step, .. }
            | StepError::Failed { step, .. } => *step,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::MissingResourceId { .. } => "precondition",
            StepError::Timeout { .. } => "timeout",
            StepError::ScheduleTimeout { .. } => "schedule_timeout",
            StepError::DeadlineExceeded { .. } => "deadline",
            StepError::Failed { .. } => "service",
        }
    }
}

/// A compensation that could not undo its step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compensation of step '{step}' for resource {resource_id} failed: {source}")]
pub struct CompensationFailure {
    pub step: StepId,
    pub resource_id: ResourceId,
    #[source]
    pub source: ServiceError,
}

/// Errors surfaced by a saga run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    /// A step failed; completed steps were compensated in reverse order.
    #[error("saga failed: {cause}")]
    Failed {
        #[source]
        cause: StepError,
        /// Compensations that failed during the unwind, in unwind order.
        compensation_errors: Vec<CompensationFailure>,
    },

    /// The saga was failed without a cause and a compensation failed.
    #[error("saga failed: {0}")]
    Compensation(#[source] CompensationFailure),

    /// The saga was failed without a cause and every compensation succeeded.
    #[error("saga failed")]
    Aborted,
}

impl SagaError {
    /// The step failure that triggered the unwind, if one was given.
    pub fn cause(&self) -> Option<&StepError> {
        match self {
            SagaError::Failed { cause, .. } => Some(cause),
            SagaError::Compensation(_) | SagaError::Aborted => None,
        }
    }

    /// Compensations that could not be applied.
    pub fn compensation_errors(&self) -> &[CompensationFailure] {
        match self {
            SagaError::Failed {
                compensation_errors,
                ..
            } => compensation_errors,
            SagaError::Compensation(failure) => std::slice::from_ref(failure),
            SagaError::Aborted => &[],
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preconditions_are_not_retryable() {
        assert!(
            !ServiceError::MissingResourceId {
                method: Method::Update
            }
            .is_retryable()
        );
        assert!(!ServiceError::UnsupportedMethod("PATCH".into()).is_retryable());
        assert!(
            ServiceError::Api {
                status: 503,
                body: "busy".into()
            }
            .is_retryable()
        );
        assert!(ServiceError::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_saga_error_wraps_cause() {
        let cause = StepError::Failed {
            step: StepId::Step2,
            attempts: 3,
            source: ServiceError::Api {
                status: 500,
                body: "fail2".into(),
            },
        };
        let err = SagaError::Failed {
            cause: cause.clone(),
            compensation_errors: vec![],
        };

        assert_eq!(err.cause(), Some(&cause));
        assert_eq!(
            err.to_string(),
            "saga failed: step 'step2' failed after 3 attempt(s): external API error: 500 fail2"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), cause.to_string());
    }

    #[test]
    fn test_compensation_variant_exposes_failure() {
        let failure = CompensationFailure {
            step: StepId::Step1,
            resource_id: "a1".into(),
            source: ServiceError::Transport("refused".into()),
        };
        let err = SagaError::Compensation(failure.clone());
        assert!(err.cause().is_none());
        assert_eq!(err.compensation_errors(), &[failure]);
        assert!(SagaError::Aborted.compensation_errors().is_empty());
    }

    #[test]
    fn test_step_accessor() {
        let err = StepError::MissingResourceId {
            step: StepId::Step3,
            method: Method::Delete,
        };
        assert_eq!(err.step(), StepId::Step3);
        assert_eq!(err.kind(), "precondition");
    }
}
