//! Saga pattern implementation for a three-service CRUD pipeline.
//!
//! A business operation (create, update or delete) is applied to three
//! independent services in order:
//! 1. Service 1
//! 2. Service 2
//! 3. Service 3
//!
//! If any step fails, the resources created by previously completed steps are
//! deleted again in reverse order. Only creations are compensated.
//!
//! Timeouts and retries around each step are declared by [`ExecutionPolicy`]
//! and enforced by an [`ExecutionSubstrate`].

pub mod coordinator;
pub mod error;
pub mod policy;
pub mod services;
pub mod state;
pub mod substrate;
pub mod workflow;

pub use coordinator::{Compensation, Saga};
pub use error::{CompensationFailure, SagaError, ServiceError, StepError};
pub use policy::{ExecutionPolicy, RetryPolicy};
pub use services::{Compensator, InMemoryCrudService, StepExecutor};
pub use state::SagaState;
pub use substrate::{ExecutionSubstrate, LocalSubstrate, RunDeadline, StepDescriptor};
pub use workflow::{PipelineConfig, RunOutcome, SagaWorkflow};
