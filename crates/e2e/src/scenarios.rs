//! Concrete runbook scenarios.

use async_trait::async_trait;

use runbook_common::{
    ExecutionParameters, HarnessConfig, HarnessError, Result, StackOutputs, StackParameter,
};
use runbook_harness::api::ComputeApi;
use runbook_harness::Scenario;

const OUTPUT_INSTANCE_ID: &str = "InstanceId";
const OUTPUT_KMS_KEY_ID: &str = "KmsKeyId";
const OUTPUT_ROLE_ARN: &str = "AutomationAssumeRoleARN";

/// Runs the encrypt-root-volume runbook against a fresh Linux instance and
/// requires the instance's root volume to come back encrypted.
pub struct EncryptRootVolume {
    /// AMI the test instance boots from
    pub ami: String,
    /// Instance type for the test instance
    pub instance_type: String,
}

impl EncryptRootVolume {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            ami: config.linux.ami.clone(),
            instance_type: config.linux.instance_type.clone(),
        }
    }
}

#[async_trait]
impl Scenario for EncryptRootVolume {
    fn name(&self) -> &str {
        "encrypt-root-volume"
    }

    fn stack_parameters(&self, caller_arn: &str) -> Vec<StackParameter> {
        vec![
            StackParameter::new("AMI", &self.ami),
            StackParameter::new("INSTANCETYPE", &self.instance_type),
            StackParameter::new("UserARN", caller_arn),
        ]
    }

    fn execution_parameters(&self, outputs: &StackOutputs) -> Result<ExecutionParameters> {
        Ok(ExecutionParameters::new()
            .set("instanceId", require_output(outputs, OUTPUT_INSTANCE_ID)?)
            .set("kmsKeyId", require_output(outputs, OUTPUT_KMS_KEY_ID)?)
            .set(
                "automationAssumeRole",
                require_output(outputs, OUTPUT_ROLE_ARN)?,
            ))
    }

    async fn verify(&self, compute: &dyn ComputeApi, outputs: &StackOutputs) -> Result<()> {
        let instance_id = require_output(outputs, OUTPUT_INSTANCE_ID)?;
        let volume = compute.root_volume(instance_id).await?;
        if !volume.encrypted {
            return Err(HarnessError::AssertionFailed(format!(
                "root volume {} of {} is not encrypted",
                volume.volume_id, instance_id
            )));
        }
        Ok(())
    }
}

/// One stack output, or the missing-output error naming the key.
fn require_output<'a>(outputs: &'a StackOutputs, key: &str) -> Result<&'a str> {
    outputs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| HarnessError::MissingOutput {
            key: key.to_string(),
        })
}
