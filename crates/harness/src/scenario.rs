//! Scenario driver
//!
//! Runs one scenario through its stages and guarantees teardown of
//! everything it provisioned, whatever the outcome: failure, caught panic,
//! or success all release the same cleanup plan.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use runbook_common::{
    wait_until, ExecutionOutcome, ExecutionParameters, HarnessError, RemoteError, Result,
    RetryPolicy, StackOutputs, StackParameter,
};

use crate::api::{CloudClients, ComputeApi, IdentityApi};
use crate::cleanup::{CleanupOutcome, CleanupPlan, CleanupStep};
use crate::document::DocumentController;
use crate::execution::ExecutionPoller;
use crate::stack::StackController;

/// Probe budget for freshly created IAM roles; propagation routinely takes
/// tens of seconds.
const ROLE_PROBE: RetryPolicy = RetryPolicy::new(12, Duration::from_secs(5));

/// Session name stamped on assume-role probes
const PROBE_SESSION: &str = "runbook-rig-readiness-probe";

/// Where a scenario run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    StackProvisioning,
    RoleVerifying,
    DocumentRegistering,
    Executing,
    Asserting,
    CleaningUp,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::StackProvisioning => write!(f, "stack_provisioning"),
            Stage::RoleVerifying => write!(f, "role_verifying"),
            Stage::DocumentRegistering => write!(f, "document_registering"),
            Stage::Executing => write!(f, "executing"),
            Stage::Asserting => write!(f, "asserting"),
            Stage::CleaningUp => write!(f, "cleaning_up"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// One runbook test scenario
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    /// Template parameters for the test stack.
    fn stack_parameters(&self, caller_arn: &str) -> Vec<StackParameter>;

    /// Execution parameters, derived from the frozen stack outputs.
    fn execution_parameters(&self, outputs: &StackOutputs) -> Result<ExecutionParameters>;

    /// Output key holding the automation role ARN.
    fn role_output_key(&self) -> &str {
        "AutomationAssumeRoleARN"
    }

    /// Assert on live infrastructure state after a successful execution.
    async fn verify(&self, compute: &dyn ComputeApi, outputs: &StackOutputs) -> Result<()>;
}

/// Serializable record of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,

    /// Stage the first meaningful failure happened in, if any
    pub failed_stage: Option<Stage>,
    pub failure: Option<String>,

    /// Every released teardown step, in release order
    pub cleanup: Vec<CleanupOutcome>,

    pub started_at: i64,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Drives scenarios end to end with guaranteed teardown
pub struct ScenarioDriver {
    clients: CloudClients,
    stack: StackController,
    document: DocumentController,
    poller: ExecutionPoller,
    role_probe: RetryPolicy,
}

impl ScenarioDriver {
    pub fn new(
        clients: CloudClients,
        stack: StackController,
        document: DocumentController,
        poller: ExecutionPoller,
    ) -> Self {
        Self {
            clients,
            stack,
            document,
            poller,
            role_probe: ROLE_PROBE,
        }
    }

    /// Override the role readiness probe cadence.
    pub fn with_role_probe(mut self, policy: RetryPolicy) -> Self {
        self.role_probe = policy;
        self
    }

    /// Run one scenario to a report.
    ///
    /// Never panics through and never skips cleanup: the teardown plan is
    /// released in reverse acquisition order on every exit path, caught
    /// panics included, and only the first meaningful failure becomes the
    /// scenario result.
    pub async fn run(mut self, scenario: &dyn Scenario) -> ScenarioReport {
        let started_at = chrono::Utc::now().timestamp();
        let started = std::time::Instant::now();
        let mut plan = CleanupPlan::new();
        let mut stage = Stage::Init;

        info!(scenario = scenario.name(), "starting scenario");
        let driven = AssertUnwindSafe(self.drive(scenario, &mut plan, &mut stage))
            .catch_unwind()
            .await;
        let failure = match driven {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(panic) => Some(HarnessError::Aborted(panic_message(panic))),
        };
        let failed_stage = failure.as_ref().map(|_| stage);
        if let Some(err) = &failure {
            warn!(scenario = scenario.name(), stage = %stage, "scenario failed: {}", err);
        }

        stage = Stage::CleaningUp;
        info!(scenario = scenario.name(), stage = %stage, "releasing cleanup plan");
        let cleanup = self.release(&mut plan).await;
        stage = Stage::Done;

        let report = ScenarioReport {
            name: scenario.name().to_string(),
            passed: failure.is_none(),
            failed_stage,
            failure: failure.map(|err| err.to_string()),
            cleanup,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            scenario = %report.name,
            stage = %stage,
            passed = report.passed,
            "scenario finished"
        );
        report
    }

    async fn drive(
        &mut self,
        scenario: &dyn Scenario,
        plan: &mut CleanupPlan,
        stage: &mut Stage,
    ) -> Result<()> {
        *stage = Stage::StackProvisioning;
        let caller_arn = self.clients.identity.caller_arn().await?;
        info!(caller = %caller_arn, "resolved caller identity");
        // The stack goes onto the plan before the create call so that a
        // failed creation still gets its rollback debris deleted.
        plan.push(CleanupStep::DeleteStack);
        self.stack
            .create_stack(scenario.stack_parameters(&caller_arn))
            .await?;

        *stage = Stage::RoleVerifying;
        let role_arn = self.stack.output(scenario.role_output_key())?.to_string();
        verify_role_assumable(self.clients.identity.as_ref(), &role_arn, self.role_probe).await?;

        *stage = Stage::DocumentRegistering;
        plan.push(CleanupStep::DestroyDocument);
        self.document.create_document().await?;

        *stage = Stage::Executing;
        let parameters = scenario.execution_parameters(self.stack.outputs()?)?;
        let handle = self.document.execute_automation(parameters).await?;
        let outcome = self.poller.wait_terminal(&handle).await?;
        if outcome != ExecutionOutcome::Success {
            return Err(HarnessError::ExecutionFailed {
                id: handle.id().to_string(),
                outcome,
            });
        }

        *stage = Stage::Asserting;
        scenario
            .verify(self.clients.compute.as_ref(), self.stack.outputs()?)
            .await?;
        Ok(())
    }

    async fn release(&mut self, plan: &mut CleanupPlan) -> Vec<CleanupOutcome> {
        let mut outcomes = Vec::new();
        for step in plan.drain_release_order() {
            let result = match step {
                CleanupStep::DestroyDocument => self.document.destroy().await,
                CleanupStep::DeleteStack => self.stack.delete_stack().await,
            };
            let outcome = match result {
                Ok(()) => CleanupOutcome {
                    step: step.to_string(),
                    succeeded: true,
                    error: None,
                },
                Err(err) => {
                    // Reported, never propagated; the remaining steps still
                    // run.
                    warn!(%step, "cleanup failed: {}", err);
                    CleanupOutcome {
                        step: step.to_string(),
                        succeeded: false,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Probe the automation role until it can actually be assumed.
///
/// Every probe failure counts as not-ready: freshly minted roles commonly
/// reject AssumeRole until propagation finishes.
pub async fn verify_role_assumable(
    identity: &dyn IdentityApi,
    role_arn: &str,
    policy: RetryPolicy,
) -> Result<()> {
    info!(role = role_arn, "verifying role is assumable");
    wait_until(policy, "automation role readiness", || async move {
        identity
            .try_assume_role(role_arn, PROBE_SESSION)
            .await
            .map_err(|err| RemoteError::Transient(err.to_string()))
    })
    .await
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
