//! Shared types for the saga orchestration workspace.
//!
//! These types cross crate boundaries: the front door builds an
//! [`OperationRequest`], the orchestrator turns it into one [`StepInput`] per
//! external service, and the operation client answers with a [`StepResult`].

pub mod method;
pub mod operation;
pub mod step;
pub mod types;

pub use method::{Method, ParseMethodError};
pub use operation::{OperationRequest, OperationResult, RequestPayload, StepInput, StepResult};
pub use step::StepId;
pub use types::{ResourceId, RunId};
