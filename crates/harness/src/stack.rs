//! Stack lifecycle controller

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use runbook_common::{
    wait_until, HarnessError, RemoteError, RemoteResult, Result, RetryPolicy, StackDescriptor,
    StackLifecycle, StackOutputs, StackParameter,
};

use crate::api::{StackApi, StackView};

/// Poll cadence for stack creation and deletion
const DEFAULT_POLL: RetryPolicy = RetryPolicy::new(120, Duration::from_secs(30));

/// Drives one test stack from declaration through teardown
pub struct StackController {
    api: Arc<dyn StackApi>,
    descriptor: StackDescriptor,
    poll: RetryPolicy,
}

impl StackController {
    pub fn new(
        api: Arc<dyn StackApi>,
        name: impl Into<String>,
        template_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            descriptor: StackDescriptor::new(name, template_path),
            poll: DEFAULT_POLL,
        }
    }

    /// Override the creation/deletion poll cadence.
    pub fn with_poll(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn lifecycle(&self) -> StackLifecycle {
        self.descriptor.lifecycle
    }

    /// Create the stack and wait until it settles.
    ///
    /// Records the parameters, submits creation, then polls the remote
    /// status: in-progress states keep waiting, CREATE_COMPLETE freezes the
    /// outputs, anything else fails with the remote reason. Exhausting the
    /// poll budget counts as a creation failure too.
    pub async fn create_stack(&mut self, parameters: Vec<StackParameter>) -> Result<()> {
        let template_path = &self.descriptor.template_path;
        let template =
            std::fs::read_to_string(template_path).map_err(|source| HarnessError::FileRead {
                path: template_path.display().to_string(),
                source,
            })?;
        self.descriptor.parameters = parameters;

        info!(stack = %self.descriptor.name, "creating stack");
        self.api
            .submit_create(
                &self.descriptor.name,
                &template,
                &self.descriptor.parameters,
            )
            .await?;

        let api = self.api.clone();
        let name = self.descriptor.name.clone();
        let settled = wait_until(self.poll, "stack creation", || {
            let api = api.clone();
            let name = name.clone();
            async move { creation_progress(api.describe(&name).await?) }
        })
        .await;

        let view = match settled {
            Ok(view) => view,
            Err(HarnessError::Remote(RemoteError::Fatal(reason))) => {
                return Err(HarnessError::StackCreateFailed { name, reason });
            }
            Err(err @ HarnessError::Exhausted { .. }) => {
                return Err(HarnessError::StackCreateFailed {
                    name,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        self.descriptor.outputs = view.outputs;
        self.descriptor.lifecycle = StackLifecycle::Provisioned;
        info!(
            stack = %self.descriptor.name,
            outputs = self.descriptor.outputs.len(),
            "stack provisioned"
        );
        Ok(())
    }

    /// Frozen outputs; readable only while provisioned.
    pub fn outputs(&self) -> Result<&StackOutputs> {
        if self.descriptor.lifecycle != StackLifecycle::Provisioned {
            return Err(HarnessError::StackOutputsUnavailable {
                name: self.descriptor.name.clone(),
                lifecycle: self.descriptor.lifecycle.to_string(),
            });
        }
        Ok(&self.descriptor.outputs)
    }

    /// One frozen output by key.
    pub fn output(&self, key: &str) -> Result<&str> {
        self.outputs()?
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| HarnessError::MissingOutput {
                key: key.to_string(),
            })
    }

    /// Delete the stack and wait until it is gone.
    ///
    /// Safe to call in any lifecycle state: an absent stack deletes as a
    /// success, and a repeated call is a local no-op. Exhausting the poll
    /// budget counts as a deletion failure, same as the create path.
    pub async fn delete_stack(&mut self) -> Result<()> {
        if self.descriptor.lifecycle == StackLifecycle::Deleted {
            debug!(stack = %self.descriptor.name, "stack already deleted");
            return Ok(());
        }

        info!(stack = %self.descriptor.name, "deleting stack");
        match self.api.submit_delete(&self.descriptor.name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                self.descriptor.lifecycle = StackLifecycle::Deleted;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let api = self.api.clone();
        let name = self.descriptor.name.clone();
        let settled = wait_until(self.poll, "stack deletion", || {
            let api = api.clone();
            let name = name.clone();
            async move { deletion_progress(api.describe(&name).await?) }
        })
        .await;

        match settled {
            Ok(()) => {
                self.descriptor.lifecycle = StackLifecycle::Deleted;
                info!(stack = %self.descriptor.name, "stack deleted");
                Ok(())
            }
            Err(HarnessError::Remote(RemoteError::Fatal(reason))) => {
                Err(HarnessError::StackDeleteFailed { name, reason })
            }
            Err(err @ HarnessError::Exhausted { .. }) => Err(HarnessError::StackDeleteFailed {
                name,
                reason: err.to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}

fn creation_progress(view: Option<StackView>) -> RemoteResult<StackView> {
    let Some(view) = view else {
        // Freshly submitted stacks can lag out of describe results.
        return Err(RemoteError::Transient("stack not visible yet".to_string()));
    };
    match view.status.as_str() {
        "CREATE_COMPLETE" => Ok(view),
        "CREATE_IN_PROGRESS" | "ROLLBACK_IN_PROGRESS" | "REVIEW_IN_PROGRESS" => {
            Err(RemoteError::Transient(format!("stack is {}", view.status)))
        }
        _ => Err(RemoteError::Fatal(failure_reason(&view))),
    }
}

fn deletion_progress(view: Option<StackView>) -> RemoteResult<()> {
    let Some(view) = view else {
        return Ok(());
    };
    match view.status.as_str() {
        "DELETE_COMPLETE" => Ok(()),
        "DELETE_FAILED" => Err(RemoteError::Fatal(failure_reason(&view))),
        _ => Err(RemoteError::Transient(format!("stack is {}", view.status))),
    }
}

fn failure_reason(view: &StackView) -> String {
    match &view.status_reason {
        Some(reason) => format!("{} ({reason})", view.status),
        None => view.status.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCloud;
    use std::io::Write;

    const FAST_POLL: RetryPolicy = RetryPolicy::new(20, Duration::from_millis(2));

    fn template() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Resources: {{}}").unwrap();
        file
    }

    fn controller(mock: &Arc<MockCloud>, template: &tempfile::NamedTempFile) -> StackController {
        StackController::new(mock.clone(), "rig-stack", template.path()).with_poll(FAST_POLL)
    }

    #[tokio::test]
    async fn test_create_waits_out_in_progress_and_freezes_outputs() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);

        stack.create_stack(vec![]).await.unwrap();
        assert_eq!(stack.lifecycle(), StackLifecycle::Provisioned);
        assert_eq!(stack.output("InstanceId").unwrap(), "i-0123456789abcdef0");
        let err = stack.output("NoSuchKey").unwrap_err();
        assert!(matches!(err, HarnessError::MissingOutput { .. }));
    }

    #[tokio::test]
    async fn test_create_failure_carries_the_remote_reason() {
        let mock = Arc::new(MockCloud::new());
        mock.tune(|behavior| behavior.fail_stack_create = true);
        let template = template();
        let mut stack = controller(&mock, &template);

        let err = stack.create_stack(vec![]).await.unwrap_err();
        match err {
            HarnessError::StackCreateFailed { name, reason } => {
                assert_eq!(name, "rig-stack");
                assert!(reason.contains("ROLLBACK_COMPLETE"), "reason: {reason}");
                assert!(reason.contains("failed to create"), "reason: {reason}");
            }
            other => panic!("expected StackCreateFailed, got {other:?}"),
        }
        assert_eq!(stack.lifecycle(), StackLifecycle::Declared);
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_is_a_creation_failure() {
        let mock = Arc::new(MockCloud::new());
        mock.tune(|behavior| behavior.creation_polls = 1_000);
        let template = template();
        let mut stack =
            StackController::new(mock.clone(), "rig-stack", template.path())
                .with_poll(RetryPolicy::new(3, Duration::from_millis(1)));

        let err = stack.create_stack(vec![]).await.unwrap_err();
        assert!(matches!(err, HarnessError::StackCreateFailed { .. }));
    }

    #[tokio::test]
    async fn test_outputs_are_unreadable_unless_provisioned() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);

        assert!(matches!(
            stack.outputs().unwrap_err(),
            HarnessError::StackOutputsUnavailable { .. }
        ));

        stack.create_stack(vec![]).await.unwrap();
        assert!(stack.outputs().is_ok());

        stack.delete_stack().await.unwrap();
        assert!(matches!(
            stack.outputs().unwrap_err(),
            HarnessError::StackOutputsUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_repeated_delete_is_a_local_no_op() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);

        stack.create_stack(vec![]).await.unwrap();
        stack.delete_stack().await.unwrap();
        assert!(!mock.stack_exists("rig-stack"));
        assert_eq!(mock.calls_matching("delete_stack"), 1);

        stack.delete_stack().await.unwrap();
        assert_eq!(mock.calls_matching("delete_stack"), 1);
    }

    #[tokio::test]
    async fn test_deleting_a_never_created_stack_succeeds() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);

        stack.delete_stack().await.unwrap();
        assert_eq!(stack.lifecycle(), StackLifecycle::Deleted);
    }

    #[tokio::test]
    async fn test_delete_failed_surfaces_with_reason() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);
        stack.create_stack(vec![]).await.unwrap();

        mock.tune(|behavior| behavior.fail_stack_delete = true);
        let err = stack.delete_stack().await.unwrap_err();
        match err {
            HarnessError::StackDeleteFailed { reason, .. } => {
                assert!(reason.contains("DELETE_FAILED"), "reason: {reason}");
            }
            other => panic!("expected StackDeleteFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_is_a_deletion_failure() {
        let mock = Arc::new(MockCloud::new());
        let template = template();
        let mut stack = controller(&mock, &template);
        stack.create_stack(vec![]).await.unwrap();

        mock.tune(|behavior| behavior.deletion_polls = 1_000);
        let err = stack.delete_stack().await.unwrap_err();
        match err {
            HarnessError::StackDeleteFailed { name, reason } => {
                assert_eq!(name, "rig-stack");
                assert!(reason.contains("not ready after"), "reason: {reason}");
            }
            other => panic!("expected StackDeleteFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_template_fails_before_any_remote_call() {
        let mock = Arc::new(MockCloud::new());
        let mut stack =
            StackController::new(mock.clone(), "rig-stack", "/nonexistent/template.yml")
                .with_poll(FAST_POLL);

        let err = stack.create_stack(vec![]).await.unwrap_err();
        assert!(matches!(err, HarnessError::FileRead { .. }));
        assert!(mock.calls().is_empty());
    }
}
