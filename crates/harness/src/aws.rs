//! AWS-backed implementation of the cloud API boundary
//!
//! One shared SDK config feeds a client per service; errors are classified
//! into the harness's transient/not-found/fatal buckets off the error code
//! and message, since several services (CloudFormation in particular)
//! report missing resources through generic validation errors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_ec2::types::Filter;
use aws_sdk_ssm::types::DocumentType;
use tracing::debug;

use runbook_common::{
    ExecutionHandle, ExecutionParameters, RemoteError, RemoteResult, StackOutputs, StackParameter,
};

use crate::api::{
    CloudClients, ComputeApi, DocumentApi, DocumentView, ExecutionView, IdentityApi, RootVolume,
    StackApi, StackView,
};

/// All four service clients over one shared SDK config
pub struct AwsCloud {
    cloudformation: aws_sdk_cloudformation::Client,
    ssm: aws_sdk_ssm::Client,
    sts: aws_sdk_sts::Client,
    ec2: aws_sdk_ec2::Client,
}

impl AwsCloud {
    /// Build the client bundle for a region, falling back to the
    /// environment's default region chain.
    pub async fn connect(region: Option<String>) -> CloudClients {
        let provider = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else(Region::new("us-east-1"));
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(provider)
            .load()
            .await;
        let cloud = Arc::new(Self {
            cloudformation: aws_sdk_cloudformation::Client::new(&config),
            ssm: aws_sdk_ssm::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            ec2: aws_sdk_ec2::Client::new(&config),
        });
        CloudClients::from_impl(cloud)
    }
}

#[async_trait]
impl StackApi for AwsCloud {
    async fn submit_create(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[StackParameter],
    ) -> RemoteResult<()> {
        let mut request = self
            .cloudformation
            .create_stack()
            .stack_name(name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityIam);
        for parameter in parameters {
            request = request.parameters(
                Parameter::builder()
                    .parameter_key(&parameter.key)
                    .parameter_value(&parameter.value)
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|err| classify("create_stack", err))?;
        Ok(())
    }

    async fn describe(&self, name: &str) -> RemoteResult<Option<StackView>> {
        let resp = match self
            .cloudformation
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let classified = classify("describe_stacks", err);
                if classified.is_not_found() {
                    return Ok(None);
                }
                return Err(classified);
            }
        };
        let Some(stack) = resp.stacks().first() else {
            return Ok(None);
        };
        let mut outputs = StackOutputs::new();
        for output in stack.outputs() {
            if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
                outputs.insert(key.to_string(), value.to_string());
            }
        }
        Ok(Some(StackView {
            status: stack
                .stack_status()
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
            status_reason: stack.stack_status_reason().map(str::to_string),
            outputs,
        }))
    }

    async fn submit_delete(&self, name: &str) -> RemoteResult<()> {
        match self
            .cloudformation
            .delete_stack()
            .stack_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let classified = classify("delete_stack", err);
                if classified.is_not_found() {
                    Ok(())
                } else {
                    Err(classified)
                }
            }
        }
    }
}

#[async_trait]
impl DocumentApi for AwsCloud {
    async fn create(&self, name: &str, content: &str) -> RemoteResult<()> {
        self.ssm
            .create_document()
            .name(name)
            .content(content)
            .document_type(DocumentType::Automation)
            .send()
            .await
            .map_err(|err| classify("create_document", err))?;
        Ok(())
    }

    async fn update(&self, name: &str, content: &str) -> RemoteResult<()> {
        match self
            .ssm
            .update_document()
            .name(name)
            .content(content)
            .document_version("$LATEST")
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                // An unchanged body already is the state we want.
                let duplicate = err
                    .as_service_error()
                    .map(|service| service.is_duplicate_document_content())
                    .unwrap_or(false);
                if duplicate {
                    debug!(document = name, "document content unchanged");
                    Ok(())
                } else {
                    Err(classify("update_document", err))
                }
            }
        }
    }

    async fn describe(&self, name: &str) -> RemoteResult<Option<DocumentView>> {
        match self.ssm.describe_document().name(name).send().await {
            Ok(resp) => Ok(Some(DocumentView {
                status: resp
                    .document()
                    .and_then(|document| document.status())
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_default(),
            })),
            Err(err) => {
                let classified = classify("describe_document", err);
                if classified.is_not_found() {
                    Ok(None)
                } else {
                    Err(classified)
                }
            }
        }
    }

    async fn delete(&self, name: &str) -> RemoteResult<()> {
        self.ssm
            .delete_document()
            .name(name)
            .send()
            .await
            .map_err(|err| classify("delete_document", err))?;
        Ok(())
    }

    async fn start_execution(
        &self,
        name: &str,
        parameters: &ExecutionParameters,
    ) -> RemoteResult<ExecutionHandle> {
        let params: HashMap<String, Vec<String>> = parameters
            .as_map()
            .iter()
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();
        let resp = self
            .ssm
            .start_automation_execution()
            .document_name(name)
            .set_parameters(Some(params))
            .send()
            .await
            .map_err(|err| classify("start_automation_execution", err))?;
        let id = resp.automation_execution_id().ok_or_else(|| {
            RemoteError::Fatal("start_automation_execution: response had no execution id".into())
        })?;
        Ok(ExecutionHandle::new(id))
    }

    async fn describe_execution(&self, handle: &ExecutionHandle) -> RemoteResult<ExecutionView> {
        let resp = self
            .ssm
            .get_automation_execution()
            .automation_execution_id(handle.id())
            .send()
            .await
            .map_err(|err| classify("get_automation_execution", err))?;
        Ok(ExecutionView {
            status: resp
                .automation_execution()
                .and_then(|execution| execution.automation_execution_status())
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl IdentityApi for AwsCloud {
    async fn caller_arn(&self) -> RemoteResult<String> {
        let resp = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|err| classify("get_caller_identity", err))?;
        resp.arn()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Fatal("get_caller_identity: response had no ARN".into()))
    }

    async fn try_assume_role(&self, role_arn: &str, session_name: &str) -> RemoteResult<()> {
        self.sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|err| classify("assume_role", err))?;
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for AwsCloud {
    async fn root_volume(&self, instance_id: &str) -> RemoteResult<RootVolume> {
        let resp = self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|err| classify("describe_instances", err))?;
        let instance = resp
            .reservations()
            .first()
            .and_then(|reservation| reservation.instances().first())
            .ok_or_else(|| {
                RemoteError::NotFound(format!("describe_instances: {instance_id} not found"))
            })?;
        let device_name = instance
            .root_device_name()
            .ok_or_else(|| {
                RemoteError::Fatal(format!(
                    "describe_instances: {instance_id} has no root device"
                ))
            })?
            .to_string();

        let resp = self
            .ec2
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("attachment.device")
                    .values(&device_name)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| classify("describe_volumes", err))?;
        let volume = resp.volumes().first().ok_or_else(|| {
            RemoteError::NotFound(format!(
                "describe_volumes: no volume at {device_name} on {instance_id}"
            ))
        })?;
        Ok(RootVolume {
            volume_id: volume.volume_id().unwrap_or_default().to_string(),
            device_name,
            encrypted: volume.encrypted().unwrap_or(false),
        })
    }
}

/// Classify an SDK failure into the harness's remote error buckets.
fn classify<E>(operation: &str, err: SdkError<E>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return RemoteError::Transient(format!("{operation}: {err}"));
    }
    let code = err.code().map(str::to_owned);
    let message = err.message().map(str::to_owned);
    classify_remote(operation, code.as_deref(), message.as_deref(), &err.to_string())
}

fn classify_remote(
    operation: &str,
    code: Option<&str>,
    message: Option<&str>,
    fallback: &str,
) -> RemoteError {
    let code = code.unwrap_or("");
    let message = message.unwrap_or("");
    let detail = if code.is_empty() && message.is_empty() {
        format!("{operation}: {fallback}")
    } else {
        format!("{operation}: {code}: {message}")
    };
    if code.contains("Throttl")
        || code == "RequestLimitExceeded"
        || code == "TooManyRequestsException"
    {
        RemoteError::Transient(detail)
    } else if code.contains("NotFound")
        || code == "InvalidDocument"
        || message.contains("does not exist")
    {
        RemoteError::NotFound(detail)
    } else {
        RemoteError::Fatal(detail)
    }
}
