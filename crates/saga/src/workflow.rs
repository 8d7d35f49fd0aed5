//! Three-step pipeline orchestrator.

use std::sync::Arc;

use common::{
    OperationRequest, OperationResult, RequestPayload, RunId, StepId, StepInput, StepResult,
};

use crate::coordinator::{Compensation, Saga};
use crate::error::{SagaError, StepError};
use crate::policy::ExecutionPolicy;
use crate::services::Compensator;
use crate::substrate::{ExecutionSubstrate, RunDeadline, StepDescriptor};

/// Everything a run depends on besides the request itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Base URL of the service behind each step, in step order.
    pub service_urls: [String; 3],
    pub policy: ExecutionPolicy,
}

impl PipelineConfig {
    pub fn new(service_urls: [String; 3]) -> Self {
        Self {
            service_urls,
            policy: ExecutionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service_url(&self, step: StepId) -> &str {
        &self.service_urls[step.index()]
    }
}

/// What a run produced: the ids reached so far and, on failure, why it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub result: OperationResult,
    pub error: Option<SagaError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Drops the partial result on failure.
    pub fn into_result(self) -> Result<OperationResult, SagaError> {
        match self.error {
            None => Ok(self.result),
            Some(err) => Err(err),
        }
    }
}

/// Drives a request through the three services, compensating creations on failure.
///
/// Steps run strictly in order. Only [`common::Method::Create`] registers
/// compensations; update and delete are never undone. Each run gets its own
/// [`Saga`].
pub struct SagaWorkflow<X, C>
where
    X: ExecutionSubstrate,
    C: Compensator + 'static,
{
    config: PipelineConfig,
    substrate: X,
    compensator: Arc<C>,
}

impl<X, C> SagaWorkflow<X, C>
where
    X: ExecutionSubstrate,
    C: Compensator + 'static,
{
    /// Creates a new orchestrator.
    pub fn new(config: PipelineConfig, substrate: X, compensator: C) -> Self {
        Self {
            config,
            substrate,
            compensator: Arc::new(compensator),
        }
    }

    /// Runs the pipeline under a fresh run id.
    pub async fn run(&self, request: &OperationRequest) -> RunOutcome {
        self.execute(RunId::new(), request).await
    }

    /// Runs the pipeline for `request`.
    ///
    /// The partially populated result is returned even when a step fails.
    #[tracing::instrument(skip(self, request), fields(method = %request.method))]
    pub async fn execute(&self, run_id: RunId, request: &OperationRequest) -> RunOutcome {
        metrics::counter!("saga_executions_total").increment(1);
        let started = std::time::Instant::now();

        let needs_compensation = request.method.needs_compensation();
        let deadline = self.substrate.start_run(&self.config.policy);
        let mut saga = Saga::new();
        let mut result = OperationResult::default();

        for step in StepId::ALL {
            tracing::info!(%step, "saga step started");
            let base_url = self.config.service_url(step);
            let outcome = saga
                .execute_step(
                    self.run_step(step, request, &deadline),
                    |output: &StepResult| {
                        (needs_compensation && !output.resource_id.is_empty()).then(|| {
                            Compensation::new(
                                step,
                                base_url,
                                output.resource_id.clone(),
                                self.compensator.clone() as Arc<dyn Compensator>,
                            )
                        })
                    },
                )
                .await;

            match outcome {
                Ok(output) => {
                    tracing::info!(%step, resource_id = %output.resource_id, "saga step completed");
                    result.set(step, output.resource_id);
                }
                Err(err) => {
                    metrics::counter!("saga_failed").increment(1);
                    metrics::histogram!("saga_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    tracing::warn!(%run_id, error = %err, "saga failed");
                    return RunOutcome {
                        run_id,
                        result,
                        error: Some(err),
                    };
                }
            }
        }

        saga.complete();
        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(%run_id, duration, "saga completed successfully");

        RunOutcome {
            run_id,
            result,
            error: None,
        }
    }

    /// Builds the step input and hands it to the substrate.
    ///
    /// Update and delete without a resource id fail here, before any call.
    async fn run_step(
        &self,
        step: StepId,
        request: &OperationRequest,
        deadline: &RunDeadline,
    ) -> Result<StepResult, StepError> {
        let method = request.method;
        let resource_id = if method.requires_resource_id() {
            let id = request
                .resource_id(step)
                .cloned()
                .ok_or(StepError::MissingResourceId { step, method })?;
            Some(id)
        } else {
            None
        };

        let input = StepInput {
            base_url: self.config.service_url(step).to_string(),
            method,
            resource_id,
            payload: RequestPayload::for_step(step, request.data.clone()),
        };
        self.substrate
            .schedule_and_execute(StepDescriptor { step, input }, &self.config.policy, deadline)
            .await
    }
}
