//! In-memory cloud for harness tests
//!
//! Faithful to the remote services' visible behavior where it matters:
//! deleting an absent stack succeeds while deleting an absent document does
//! not, describes of missing resources return `None`, and freshly created
//! resources spend a configurable number of polls in their transitional
//! status. Every mutating call lands in an ordered log so tests can assert
//! cleanup ordering.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use runbook_common::{
    ExecutionHandle, ExecutionParameters, RemoteError, RemoteResult, StackOutputs, StackParameter,
};

use crate::api::{
    ComputeApi, DocumentApi, DocumentView, ExecutionView, IdentityApi, RootVolume, StackApi,
    StackView,
};

/// Failure-injection and pacing knobs
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Polls a stack spends in CREATE_IN_PROGRESS before settling
    pub creation_polls: u32,

    /// Polls a stack spends in DELETE_IN_PROGRESS before disappearing
    pub deletion_polls: u32,

    /// Route stack creation into rollback instead of CREATE_COMPLETE
    pub fail_stack_create: bool,

    /// Land stack deletion in DELETE_FAILED
    pub fail_stack_delete: bool,

    /// Reject document deletion outright
    pub fail_document_delete: bool,

    /// Polls a document spends transitional before its terminal status
    pub document_polls: u32,

    /// Raw terminal document status after registration
    pub document_terminal_status: String,

    /// Polls an execution spends InProgress before its terminal status
    pub execution_polls: u32,

    /// Raw terminal status handed back for executions
    pub execution_terminal_status: String,

    /// Assume-role probes that fail before one succeeds
    pub role_failures: u32,

    /// Whether described root volumes report encryption
    pub volume_encrypted: bool,

    /// Outputs a stack exposes once CREATE_COMPLETE
    pub stack_outputs: StackOutputs,
}

impl Default for Behavior {
    fn default() -> Self {
        let mut stack_outputs = StackOutputs::new();
        stack_outputs.insert(
            "AutomationAssumeRoleARN".to_string(),
            "arn:aws:iam::123456789012:role/rig-automation".to_string(),
        );
        stack_outputs.insert("InstanceId".to_string(), "i-0123456789abcdef0".to_string());
        stack_outputs.insert(
            "KmsKeyId".to_string(),
            "arn:aws:kms:us-east-1:123456789012:key/11111111-2222-3333-4444-555555555555"
                .to_string(),
        );
        Self {
            creation_polls: 2,
            deletion_polls: 1,
            fail_stack_create: false,
            fail_stack_delete: false,
            fail_document_delete: false,
            document_polls: 1,
            document_terminal_status: "Active".to_string(),
            execution_polls: 2,
            execution_terminal_status: "Success".to_string(),
            role_failures: 0,
            volume_encrypted: true,
            stack_outputs,
        }
    }
}

#[derive(Debug)]
struct StackRecord {
    transitional_status: String,
    polls_remaining: u32,
    /// `None` means the stack disappears once the transitional polls are
    /// spent (the deletion path).
    terminal_status: Option<String>,
    status_reason: Option<String>,
    outputs: StackOutputs,
}

#[derive(Debug)]
struct DocumentRecord {
    transitional_status: String,
    polls_remaining: u32,
    terminal_status: String,
}

#[derive(Debug)]
struct ExecutionRecord {
    polls_remaining: u32,
    terminal_status: String,
    parameters: ExecutionParameters,
}

#[derive(Default)]
struct MockState {
    behavior: Behavior,
    stacks: BTreeMap<String, StackRecord>,
    documents: BTreeMap<String, DocumentRecord>,
    executions: BTreeMap<String, ExecutionRecord>,
    calls: Vec<String>,
    role_attempts: u32,
}

/// In-memory stand-in for the whole remote side
pub struct MockCloud {
    state: Mutex<MockState>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Adjust behavior knobs before (or between) operations.
    pub fn tune(&self, adjust: impl FnOnce(&mut Behavior)) {
        adjust(&mut self.state.lock().behavior);
    }

    /// Ordered log of mutating calls, e.g. `delete_document rig-doc`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Position of the first logged call starting with `prefix`.
    pub fn call_position(&self, prefix: &str) -> Option<usize> {
        self.state
            .lock()
            .calls
            .iter()
            .position(|call| call.starts_with(prefix))
    }

    /// Number of logged calls starting with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn stack_exists(&self, name: &str) -> bool {
        self.state.lock().stacks.contains_key(name)
    }

    pub fn document_exists(&self, name: &str) -> bool {
        self.state.lock().documents.contains_key(name)
    }

    pub fn assume_role_attempts(&self) -> u32 {
        self.state.lock().role_attempts
    }

    /// Parameters an execution was started with.
    pub fn execution_parameters(&self, handle: &ExecutionHandle) -> Option<ExecutionParameters> {
        self.state
            .lock()
            .executions
            .get(handle.id())
            .map(|record| record.parameters.clone())
    }

    /// Drop a document behind the harness's back, as if deleted externally.
    pub fn remove_document(&self, name: &str) {
        self.state.lock().documents.remove(name);
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackApi for MockCloud {
    async fn submit_create(
        &self,
        name: &str,
        _template_body: &str,
        _parameters: &[StackParameter],
    ) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("create_stack {name}"));
        if state.stacks.contains_key(name) {
            return Err(RemoteError::Fatal(format!(
                "create_stack: stack {name} already exists"
            )));
        }
        let behavior = state.behavior.clone();
        let record = if behavior.fail_stack_create {
            StackRecord {
                transitional_status: "ROLLBACK_IN_PROGRESS".to_string(),
                polls_remaining: behavior.creation_polls,
                terminal_status: Some("ROLLBACK_COMPLETE".to_string()),
                status_reason: Some(
                    "The following resource(s) failed to create: [Instance]".to_string(),
                ),
                outputs: StackOutputs::new(),
            }
        } else {
            StackRecord {
                transitional_status: "CREATE_IN_PROGRESS".to_string(),
                polls_remaining: behavior.creation_polls,
                terminal_status: Some("CREATE_COMPLETE".to_string()),
                status_reason: None,
                outputs: behavior.stack_outputs.clone(),
            }
        };
        state.stacks.insert(name.to_string(), record);
        Ok(())
    }

    async fn describe(&self, name: &str) -> RemoteResult<Option<StackView>> {
        let mut state = self.state.lock();
        let Some(record) = state.stacks.get_mut(name) else {
            return Ok(None);
        };
        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return Ok(Some(StackView {
                status: record.transitional_status.clone(),
                status_reason: None,
                outputs: StackOutputs::new(),
            }));
        }
        match &record.terminal_status {
            Some(status) => Ok(Some(StackView {
                status: status.clone(),
                status_reason: record.status_reason.clone(),
                outputs: if status == "CREATE_COMPLETE" {
                    record.outputs.clone()
                } else {
                    StackOutputs::new()
                },
            })),
            None => {
                state.stacks.remove(name);
                Ok(None)
            }
        }
    }

    async fn submit_delete(&self, name: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete_stack {name}"));
        let behavior = state.behavior.clone();
        let Some(record) = state.stacks.get_mut(name) else {
            // Deleting an absent stack is a success remotely.
            return Ok(());
        };
        if behavior.fail_stack_delete {
            record.transitional_status = "DELETE_IN_PROGRESS".to_string();
            record.polls_remaining = behavior.deletion_polls;
            record.terminal_status = Some("DELETE_FAILED".to_string());
            record.status_reason =
                Some("role arn is invalid or cannot be assumed".to_string());
        } else {
            record.transitional_status = "DELETE_IN_PROGRESS".to_string();
            record.polls_remaining = behavior.deletion_polls;
            record.terminal_status = None;
            record.status_reason = None;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentApi for MockCloud {
    async fn create(&self, name: &str, _content: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("create_document {name}"));
        if state.documents.contains_key(name) {
            return Err(RemoteError::Fatal(format!(
                "create_document: document {name} already exists"
            )));
        }
        let behavior = state.behavior.clone();
        state.documents.insert(
            name.to_string(),
            DocumentRecord {
                transitional_status: "Creating".to_string(),
                polls_remaining: behavior.document_polls,
                terminal_status: behavior.document_terminal_status,
            },
        );
        Ok(())
    }

    async fn update(&self, name: &str, _content: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("update_document {name}"));
        let behavior = state.behavior.clone();
        let Some(record) = state.documents.get_mut(name) else {
            return Err(RemoteError::NotFound(format!(
                "update_document: document {name} does not exist"
            )));
        };
        record.transitional_status = "Updating".to_string();
        record.polls_remaining = behavior.document_polls;
        record.terminal_status = behavior.document_terminal_status;
        Ok(())
    }

    async fn describe(&self, name: &str) -> RemoteResult<Option<DocumentView>> {
        let mut state = self.state.lock();
        let Some(record) = state.documents.get_mut(name) else {
            return Ok(None);
        };
        let status = if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            record.transitional_status.clone()
        } else {
            record.terminal_status.clone()
        };
        Ok(Some(DocumentView { status }))
    }

    async fn delete(&self, name: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete_document {name}"));
        if state.behavior.fail_document_delete {
            return Err(RemoteError::Fatal(format!(
                "delete_document: access denied for {name}"
            )));
        }
        if state.documents.remove(name).is_none() {
            // SSM is not idempotent here, unlike CloudFormation.
            return Err(RemoteError::NotFound(format!(
                "delete_document: document {name} does not exist"
            )));
        }
        Ok(())
    }

    async fn start_execution(
        &self,
        name: &str,
        parameters: &ExecutionParameters,
    ) -> RemoteResult<ExecutionHandle> {
        let mut state = self.state.lock();
        state.calls.push(format!("start_execution {name}"));
        let behavior = state.behavior.clone();
        let active = state
            .documents
            .get(name)
            .map(|record| record.polls_remaining == 0 && record.terminal_status == "Active")
            .unwrap_or(false);
        if !active {
            return Err(RemoteError::Fatal(format!(
                "start_execution: document {name} is not executable"
            )));
        }
        let id = Uuid::new_v4().to_string();
        state.executions.insert(
            id.clone(),
            ExecutionRecord {
                polls_remaining: behavior.execution_polls,
                terminal_status: behavior.execution_terminal_status,
                parameters: parameters.clone(),
            },
        );
        Ok(ExecutionHandle::new(id))
    }

    async fn describe_execution(&self, handle: &ExecutionHandle) -> RemoteResult<ExecutionView> {
        let mut state = self.state.lock();
        let Some(record) = state.executions.get_mut(handle.id()) else {
            return Err(RemoteError::NotFound(format!(
                "describe_execution: execution {handle} does not exist"
            )));
        };
        let status = if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            "InProgress".to_string()
        } else {
            record.terminal_status.clone()
        };
        Ok(ExecutionView { status })
    }
}

#[async_trait]
impl IdentityApi for MockCloud {
    async fn caller_arn(&self) -> RemoteResult<String> {
        let mut state = self.state.lock();
        state.calls.push("caller_arn".to_string());
        Ok("arn:aws:iam::123456789012:user/rig-ci".to_string())
    }

    async fn try_assume_role(&self, role_arn: &str, _session_name: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.role_attempts += 1;
        state.calls.push(format!("assume_role {role_arn}"));
        if state.role_attempts <= state.behavior.role_failures {
            return Err(RemoteError::Transient(format!(
                "assume_role: access denied for {role_arn}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for MockCloud {
    async fn root_volume(&self, instance_id: &str) -> RemoteResult<RootVolume> {
        let mut state = self.state.lock();
        state.calls.push(format!("root_volume {instance_id}"));
        Ok(RootVolume {
            volume_id: "vol-0123456789abcdef0".to_string(),
            device_name: "/dev/xvda".to_string(),
            encrypted: state.behavior.volume_encrypted,
        })
    }
}
