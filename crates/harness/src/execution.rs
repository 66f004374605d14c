//! Automation execution polling

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use runbook_common::{ExecutionHandle, ExecutionOutcome, HarnessError, Result};

use crate::api::DocumentApi;

/// Wait between execution status polls
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Polls automation executions to a terminal outcome
pub struct ExecutionPoller {
    api: Arc<dyn DocumentApi>,
    interval: Duration,
    ceiling: Option<Duration>,
}

impl ExecutionPoller {
    pub fn new(api: Arc<dyn DocumentApi>) -> Self {
        Self {
            api,
            interval: DEFAULT_INTERVAL,
            ceiling: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bound the terminal wait by wall-clock time. Unbounded by default;
    /// the execution itself is expected to finish or time out remotely.
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// One describe, mapped into the closed outcome set. Never blocks.
    pub async fn snapshot(&self, handle: &ExecutionHandle) -> Result<ExecutionOutcome> {
        let view = self.api.describe_execution(handle).await?;
        Ok(ExecutionOutcome::from_remote(&view.status))
    }

    /// Poll until the execution reaches a terminal outcome.
    ///
    /// There is deliberately no attempt budget here; a runaway wait is cut
    /// off by the optional ceiling instead.
    pub async fn wait_terminal(&self, handle: &ExecutionHandle) -> Result<ExecutionOutcome> {
        let started = Instant::now();
        loop {
            let outcome = self.snapshot(handle).await?;
            if outcome.is_terminal() {
                info!(execution = %handle, %outcome, "execution finished");
                return Ok(outcome);
            }
            debug!(execution = %handle, %outcome, "execution still running");
            if let Some(ceiling) = self.ceiling {
                if started.elapsed() >= ceiling {
                    return Err(HarnessError::ExecutionWaitCeiling {
                        id: handle.id().to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }
            sleep(self.interval).await;
        }
    }
}
