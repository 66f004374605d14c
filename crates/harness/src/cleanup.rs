//! Scoped teardown of provisioned resources
//!
//! Steps are recorded at acquisition time and released in reverse order, so
//! whatever was provisioned last is torn down first.

use serde::{Deserialize, Serialize};

/// One teardown action, recorded at acquisition time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    DestroyDocument,
    DeleteStack,
}

impl std::fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupStep::DestroyDocument => write!(f, "destroy_document"),
            CleanupStep::DeleteStack => write!(f, "delete_stack"),
        }
    }
}

/// Teardown actions in acquisition order
#[derive(Debug, Default)]
pub struct CleanupPlan {
    steps: Vec<CleanupStep>,
}

impl CleanupPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step. Recording the same step twice keeps its original
    /// position.
    pub fn push(&mut self, step: CleanupStep) {
        if !self.steps.contains(&step) {
            self.steps.push(step);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in release order (reverse of acquisition), leaving the plan
    /// empty.
    pub fn drain_release_order(&mut self) -> Vec<CleanupStep> {
        let mut steps = std::mem::take(&mut self.steps);
        steps.reverse();
        steps
    }
}

/// Result of one released cleanup step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub step: String,
    pub succeeded: bool,
    pub error: Option<String>,
}
