//! Automation document controller

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use runbook_common::{
    wait_until, AutomationDocumentDescriptor, DocumentStatus, ExecutionHandle,
    ExecutionParameters, HarnessError, RemoteError, Result, RetryPolicy,
};

use crate::api::DocumentApi;

/// Poll cadence for document registration
const DEFAULT_POLL: RetryPolicy = RetryPolicy::new(30, Duration::from_secs(2));

/// Drives one automation document from definition file to active remote
/// document and back out
pub struct DocumentController {
    api: Arc<dyn DocumentApi>,
    descriptor: AutomationDocumentDescriptor,
    poll: RetryPolicy,
}

impl DocumentController {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        name: impl Into<String>,
        definition_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            descriptor: AutomationDocumentDescriptor::new(name, definition_path),
            poll: DEFAULT_POLL,
        }
    }

    /// Override the registration poll cadence.
    pub fn with_poll(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn status(&self) -> DocumentStatus {
        self.descriptor.status
    }

    /// Register the document, or refresh it in place when it already
    /// exists, then wait out the transitional states.
    ///
    /// Succeeds only when the document settles Active.
    pub async fn create_document(&mut self) -> Result<DocumentStatus> {
        let definition_path = &self.descriptor.definition_path;
        let content =
            std::fs::read_to_string(definition_path).map_err(|source| HarnessError::FileRead {
                path: definition_path.display().to_string(),
                source,
            })?;

        let name = self.descriptor.name.clone();
        if self.api.describe(&name).await?.is_some() {
            info!(document = %name, "document already registered, updating in place");
            self.api.update(&name, &content).await?;
        } else {
            info!(document = %name, "registering document");
            self.api.create(&name, &content).await?;
        }
        self.descriptor.status = DocumentStatus::Creating;

        let api = self.api.clone();
        let status = wait_until(self.poll, "document registration", || {
            let api = api.clone();
            let name = name.clone();
            async move {
                let view = api.describe(&name).await?.ok_or_else(|| {
                    RemoteError::Transient("document not visible yet".to_string())
                })?;
                let status = DocumentStatus::from_remote(&view.status);
                if status.is_transitional() {
                    Err(RemoteError::Transient(format!(
                        "document is {}",
                        view.status
                    )))
                } else {
                    Ok(status)
                }
            }
        })
        .await?;

        self.descriptor.status = status;
        if status != DocumentStatus::Active {
            return Err(HarnessError::DocumentRegistrationFailed {
                name: self.descriptor.name.clone(),
                status,
            });
        }
        info!(document = %self.descriptor.name, "document active");
        Ok(status)
    }

    /// Start an automation execution of this document.
    ///
    /// Refuses locally unless the document registered Active; no remote
    /// call is made otherwise. Parameter values are lists even when
    /// single-valued.
    pub async fn execute_automation(
        &self,
        parameters: ExecutionParameters,
    ) -> Result<ExecutionHandle> {
        if self.descriptor.status != DocumentStatus::Active {
            return Err(HarnessError::ExecutionTriggerFailed {
                name: self.descriptor.name.clone(),
                status: self.descriptor.status,
            });
        }
        info!(document = %self.descriptor.name, "starting automation execution");
        let handle = self
            .api
            .start_execution(&self.descriptor.name, &parameters)
            .await?;
        debug!(execution = %handle, "execution started");
        Ok(handle)
    }

    /// Deregister the document.
    ///
    /// Absent-safe on both sides: a never-registered document is a local
    /// no-op, and a remote not-found counts as already gone.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.descriptor.status == DocumentStatus::Unregistered {
            debug!(document = %self.descriptor.name, "document never registered, nothing to destroy");
            return Ok(());
        }
        match self.api.delete(&self.descriptor.name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(document = %self.descriptor.name, "document already gone");
            }
            Err(err) => return Err(err.into()),
        }
        self.descriptor.status = DocumentStatus::Unregistered;
        info!(document = %self.descriptor.name, "document destroyed");
        Ok(())
    }
}
