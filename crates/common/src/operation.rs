//! Request, result and per-step payload types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::method::Method;
use crate::step::StepId;
use crate::types::ResourceId;

/// A business operation to apply across all three services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub method: Method,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Resource at service 1; required for update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id1: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id2: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id3: Option<ResourceId>,
}

impl OperationRequest {
    /// Creates a request without resource ids.
    pub fn new(method: Method, data: Map<String, Value>) -> Self {
        Self {
            method,
            data,
            id1: None,
            id2: None,
            id3: None,
        }
    }

    /// Creation request; resource ids are assigned by the services.
    pub fn create(data: Map<String, Value>) -> Self {
        Self::new(Method::Create, data)
    }

    /// Sets the pre-existing resource ids for update or delete.
    pub fn with_ids(
        mut self,
        id1: impl Into<ResourceId>,
        id2: impl Into<ResourceId>,
        id3: impl Into<ResourceId>,
    ) -> Self {
        self.id1 = Some(id1.into());
        self.id2 = Some(id2.into());
        self.id3 = Some(id3.into());
        self
    }

    /// The non-empty resource id supplied for `step`, if any.
    pub fn resource_id(&self, step: StepId) -> Option<&ResourceId> {
        let id = match step {
            StepId::Step1 => self.id1.as_ref(),
            StepId::Step2 => self.id2.as_ref(),
            StepId::Step3 => self.id3.as_ref(),
        };
        id.filter(|id| !id.is_empty())
    }
}

/// Resource ids reached by each step, filled in as steps succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub step1_id: Option<ResourceId>,
    pub step2_id: Option<ResourceId>,
    pub step3_id: Option<ResourceId>,
}

impl OperationResult {
    pub fn get(&self, step: StepId) -> Option<&ResourceId> {
        match step {
            StepId::Step1 => self.step1_id.as_ref(),
            StepId::Step2 => self.step2_id.as_ref(),
            StepId::Step3 => self.step3_id.as_ref(),
        }
    }

    pub fn set(&mut self, step: StepId, id: ResourceId) {
        let slot = match step {
            StepId::Step1 => &mut self.step1_id,
            StepId::Step2 => &mut self.step2_id,
            StepId::Step3 => &mut self.step3_id,
        };
        *slot = Some(id);
    }

    /// True once every step has recorded an id.
    pub fn is_complete(&self) -> bool {
        StepId::ALL.iter().all(|step| self.get(*step).is_some())
    }
}

/// JSON body sent to an external service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Per-step tag (`step1`, `step2`, `step3`).
    pub operation: String,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl RequestPayload {
    pub fn for_step(step: StepId, data: Map<String, Value>) -> Self {
        Self {
            operation: step.as_str().to_string(),
            data,
            meta: None,
        }
    }
}

/// Input of one step invocation against one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub base_url: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
    pub payload: RequestPayload,
}

/// Outcome of a successful step invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub resource_id: ResourceId,
}

impl StepResult {
    pub fn new(resource_id: impl Into<ResourceId>) -> Self {
        Self {
            resource_id: resource_id.into(),
        }
    }
}
