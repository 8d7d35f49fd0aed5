//! External service seams consumed by the saga, plus an in-memory implementation.

pub mod in_memory;

use async_trait::async_trait;
use common::{ResourceId, StepInput, StepResult};

use crate::error::ServiceError;

pub use in_memory::InMemoryCrudService;

/// Performs one step against an external CRUD service.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Applies the operation and returns the created, updated or deleted resource id.
    async fn perform(&self, input: &StepInput) -> Result<StepResult, ServiceError>;
}

/// Undoes a resource created by an earlier step.
#[async_trait]
pub trait Compensator: Send + Sync {
    /// Best-effort removal of `resource_id` from the service at `base_url`.
    async fn undo(&self, base_url: &str, resource_id: &ResourceId) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: StepExecutor + ?Sized> StepExecutor for std::sync::Arc<T> {
    async fn perform(&self, input: &StepInput) -> Result<StepResult, ServiceError> {
        (**self).perform(input).await
    }
}

#[async_trait]
impl<T: Compensator + ?Sized> Compensator for std::sync::Arc<T> {
    async fn undo(&self, base_url: &str, resource_id: &ResourceId) -> Result<(), ServiceError> {
        (**self).undo(base_url, resource_id).await
    }
}
