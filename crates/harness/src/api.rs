//! Cloud API boundary
//!
//! Narrow, object-safe traits over the remote services the harness touches.
//! Controllers depend on these traits only; the AWS implementation lives in
//! [`crate::aws`] and the in-memory test double in [`crate::mock`].

use std::sync::Arc;

use async_trait::async_trait;

use runbook_common::{
    ExecutionHandle, ExecutionParameters, RemoteResult, StackOutputs, StackParameter,
};

/// Remote view of a stack
#[derive(Debug, Clone)]
pub struct StackView {
    /// Raw remote status string, e.g. `CREATE_COMPLETE`
    pub status: String,

    /// Remote explanation for failure states, when present
    pub status_reason: Option<String>,

    /// Current outputs; empty until creation completes
    pub outputs: StackOutputs,
}

/// Remote view of an automation document
#[derive(Debug, Clone)]
pub struct DocumentView {
    /// Raw remote status string, e.g. `Active`
    pub status: String,
}

/// Remote view of an automation execution
#[derive(Debug, Clone)]
pub struct ExecutionView {
    /// Raw remote status string, e.g. `InProgress`
    pub status: String,
}

/// Root volume facts for one instance
#[derive(Debug, Clone)]
pub struct RootVolume {
    pub volume_id: String,
    pub device_name: String,
    pub encrypted: bool,
}

/// Stack operations
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Submit stack creation and return without waiting.
    async fn submit_create(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[StackParameter],
    ) -> RemoteResult<()>;

    /// Describe one stack; `None` when it does not exist.
    async fn describe(&self, name: &str) -> RemoteResult<Option<StackView>>;

    /// Submit stack deletion; deleting an absent stack succeeds.
    async fn submit_delete(&self, name: &str) -> RemoteResult<()>;
}

/// Automation document operations
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn create(&self, name: &str, content: &str) -> RemoteResult<()>;

    /// Update the latest document version; an unchanged body succeeds.
    async fn update(&self, name: &str, content: &str) -> RemoteResult<()>;

    /// Describe one document; `None` when it does not exist.
    async fn describe(&self, name: &str) -> RemoteResult<Option<DocumentView>>;

    async fn delete(&self, name: &str) -> RemoteResult<()>;

    async fn start_execution(
        &self,
        name: &str,
        parameters: &ExecutionParameters,
    ) -> RemoteResult<ExecutionHandle>;

    async fn describe_execution(&self, handle: &ExecutionHandle) -> RemoteResult<ExecutionView>;
}

/// Identity operations
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// ARN of the identity the harness runs as.
    async fn caller_arn(&self) -> RemoteResult<String>;

    /// One assume-role probe; success means the role is usable.
    async fn try_assume_role(&self, role_arn: &str, session_name: &str) -> RemoteResult<()>;
}

/// Instance and volume lookups used by scenario assertions
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Resolve the volume attached as an instance's root device.
    async fn root_volume(&self, instance_id: &str) -> RemoteResult<RootVolume>;
}

/// Bundle of remote service handles, built once per run and passed around by
/// reference
#[derive(Clone)]
pub struct CloudClients {
    pub stacks: Arc<dyn StackApi>,
    pub documents: Arc<dyn DocumentApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub compute: Arc<dyn ComputeApi>,
}

impl CloudClients {
    /// Bundle backed by a single implementation of every trait.
    pub fn from_impl<C>(cloud: Arc<C>) -> Self
    where
        C: StackApi + DocumentApi + IdentityApi + ComputeApi + 'static,
    {
        Self {
            stacks: cloud.clone(),
            documents: cloud.clone(),
            identity: cloud.clone(),
            compute: cloud,
        }
    }
}
