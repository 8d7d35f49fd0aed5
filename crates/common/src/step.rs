//! Identity of the three pipeline steps.

use serde::{Deserialize, Serialize};

/// One of the three steps of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Step1,
    Step2,
    Step3,
}

impl StepId {
    /// All steps in execution order.
    pub const ALL: [StepId; 3] = [StepId::Step1, StepId::Step2, StepId::Step3];

    /// Zero-based position in the pipeline.
    pub fn index(&self) -> usize {
        match self {
            StepId::Step1 => 0,
            StepId::Step2 => 1,
            StepId::Step3 => 2,
        }
    }

    /// Tag carried in the request payload's `operation` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Step1 => "step1",
            StepId::Step2 => "step2",
            StepId::Step3 => "step3",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
