//! Core types for the runbook harness

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stack lifecycle as tracked locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackLifecycle {
    Declared,
    Provisioned,
    Deleted,
}

impl Default for StackLifecycle {
    fn default() -> Self {
        Self::Declared
    }
}

impl std::fmt::Display for StackLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackLifecycle::Declared => write!(f, "declared"),
            StackLifecycle::Provisioned => write!(f, "provisioned"),
            StackLifecycle::Deleted => write!(f, "deleted"),
        }
    }
}

/// Registration state of an automation document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Unregistered,
    Creating,
    Active,
    Failed,
}

impl DocumentStatus {
    /// Buckets a raw remote document status.
    ///
    /// The transitional remote states (Creating, Updating, Deleting) all
    /// report as Creating; anything unrecognized is Failed.
    pub fn from_remote(raw: &str) -> Self {
        match raw {
            "Active" => DocumentStatus::Active,
            "Creating" | "Updating" | "Deleting" => DocumentStatus::Creating,
            _ => DocumentStatus::Failed,
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, DocumentStatus::Creating)
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        Self::Unregistered
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Unregistered => write!(f, "unregistered"),
            DocumentStatus::Creating => write!(f, "creating"),
            DocumentStatus::Active => write!(f, "active"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of an automation execution, as a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Pending,
    InProgress,
    Success,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionOutcome {
    /// Maps a raw remote execution status into the closed outcome set.
    ///
    /// Waiting executions count as in progress. A cancellation still in
    /// flight already reports Cancelled. Raw statuses outside the known
    /// set are treated as terminal failures rather than polled forever.
    pub fn from_remote(raw: &str) -> Self {
        match raw {
            "Pending" => ExecutionOutcome::Pending,
            "InProgress" | "Waiting" => ExecutionOutcome::InProgress,
            "Success" => ExecutionOutcome::Success,
            "TimedOut" => ExecutionOutcome::TimedOut,
            "Cancelled" | "Cancelling" => ExecutionOutcome::Cancelled,
            _ => ExecutionOutcome::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionOutcome::Pending | ExecutionOutcome::InProgress)
    }
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Pending => write!(f, "pending"),
            ExecutionOutcome::InProgress => write!(f, "in_progress"),
            ExecutionOutcome::Success => write!(f, "success"),
            ExecutionOutcome::Failed => write!(f, "failed"),
            ExecutionOutcome::TimedOut => write!(f, "timed_out"),
            ExecutionOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Opaque identifier of a started automation execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One template parameter passed at stack creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    pub key: String,
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Stack outputs frozen at provisioning time
pub type StackOutputs = BTreeMap<String, String>;

/// Execution parameters: every value is a list, even single-valued ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParameters {
    values: BTreeMap<String, Vec<String>>,
}

impl ExecutionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single-valued parameter, stored as a one-element list.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), vec![value.into()]);
        self
    }

    pub fn set_list(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.values.insert(key.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.values
    }
}

/// Local record of a test stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDescriptor {
    pub name: String,
    pub template_path: PathBuf,
    #[serde(default)]
    pub parameters: Vec<StackParameter>,
    #[serde(default)]
    pub outputs: StackOutputs,
    #[serde(default)]
    pub lifecycle: StackLifecycle,
}

impl StackDescriptor {
    pub fn new(name: impl Into<String>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            template_path: template_path.into(),
            parameters: Vec::new(),
            outputs: StackOutputs::new(),
            lifecycle: StackLifecycle::Declared,
        }
    }
}

/// Local record of an automation document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationDocumentDescriptor {
    pub name: String,
    pub definition_path: PathBuf,
    #[serde(default)]
    pub status: DocumentStatus,
}

impl AutomationDocumentDescriptor {
    pub fn new(name: impl Into<String>, definition_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            definition_path: definition_path.into(),
            status: DocumentStatus::Unregistered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Pending", ExecutionOutcome::Pending; "pending stays pending")]
    #[test_case("InProgress", ExecutionOutcome::InProgress; "in progress")]
    #[test_case("Waiting", ExecutionOutcome::InProgress; "waiting counts as in progress")]
    #[test_case("Success", ExecutionOutcome::Success; "success")]
    #[test_case("Failed", ExecutionOutcome::Failed; "failed")]
    #[test_case("TimedOut", ExecutionOutcome::TimedOut; "timed out")]
    #[test_case("Cancelled", ExecutionOutcome::Cancelled; "cancelled")]
    #[test_case("Cancelling", ExecutionOutcome::Cancelled; "cancelling reports cancelled")]
    #[test_case("CompletedWithFailure", ExecutionOutcome::Failed; "unknown raw status is a terminal failure")]
    #[test_case("", ExecutionOutcome::Failed; "empty raw status is a terminal failure")]
    fn test_execution_outcome_mapping(raw: &str, expected: ExecutionOutcome) {
        assert_eq!(ExecutionOutcome::from_remote(raw), expected);
    }

    #[test]
    fn test_only_pending_and_in_progress_are_non_terminal() {
        assert!(!ExecutionOutcome::Pending.is_terminal());
        assert!(!ExecutionOutcome::InProgress.is_terminal());
        for outcome in [
            ExecutionOutcome::Success,
            ExecutionOutcome::Failed,
            ExecutionOutcome::TimedOut,
            ExecutionOutcome::Cancelled,
        ] {
            assert!(outcome.is_terminal(), "{outcome} should be terminal");
        }
    }

    #[test_case("Active", DocumentStatus::Active; "active")]
    #[test_case("Creating", DocumentStatus::Creating; "creating")]
    #[test_case("Updating", DocumentStatus::Creating; "updating is transitional")]
    #[test_case("Deleting", DocumentStatus::Creating; "deleting is transitional")]
    #[test_case("Failed", DocumentStatus::Failed; "failed")]
    #[test_case("Banana", DocumentStatus::Failed; "unknown raw status is failed")]
    fn test_document_status_mapping(raw: &str, expected: DocumentStatus) {
        assert_eq!(DocumentStatus::from_remote(raw), expected);
    }

    #[test]
    fn test_execution_parameters_store_lists() {
        let params = ExecutionParameters::new()
            .set("instanceId", "i-0123456789abcdef0")
            .set_list("tags", vec!["a".into(), "b".into()]);
        assert_eq!(
            params.as_map().get("instanceId"),
            Some(&vec!["i-0123456789abcdef0".to_string()])
        );
        assert_eq!(params.as_map().get("tags").map(Vec::len), Some(2));
    }

    #[test]
    fn test_descriptors_start_unprovisioned() {
        let stack = StackDescriptor::new("rig-test", "templates/test-stack.yml");
        assert_eq!(stack.lifecycle, StackLifecycle::Declared);
        assert!(stack.outputs.is_empty());

        let doc = AutomationDocumentDescriptor::new("rig-doc", "documents/doc.json");
        assert_eq!(doc.status, DocumentStatus::Unregistered);
    }
}
