//! Copy-snapshot runbook handler
//!
//! Invoked by the copy-snapshot automation document; forwards one
//! CopySnapshot call and hands the new snapshot id back to the automation.

use async_trait::async_trait;
use lambda_runtime::Error;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Event shape the automation document invokes us with
#[derive(Debug, Clone, Deserialize)]
pub struct CopySnapshotRequest {
    #[serde(rename = "SnapshotId")]
    pub snapshot_id: String,

    #[serde(rename = "SourceRegion")]
    pub source_region: String,

    #[serde(rename = "Description")]
    pub description: String,
}

/// Response consumed by the automation's output selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopySnapshotResponse {
    #[serde(rename = "SnapshotId")]
    pub snapshot_id: String,
}

/// The one remote call the handler makes; a seam for tests
#[async_trait]
pub trait SnapshotCopier: Send + Sync {
    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, Error>;
}

/// EC2-backed copier
pub struct Ec2SnapshotCopier {
    client: aws_sdk_ec2::Client,
}

impl Ec2SnapshotCopier {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotCopier for Ec2SnapshotCopier {
    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, Error> {
        let resp = self
            .client
            .copy_snapshot()
            .source_region(source_region)
            .source_snapshot_id(snapshot_id)
            .description(description)
            .send()
            .await?;
        let id = resp
            .snapshot_id()
            .ok_or("copy_snapshot response had no snapshot id")?;
        Ok(id.to_string())
    }
}

/// Handle one invocation.
///
/// Remote failures propagate unchanged so the automation records the real
/// error; missing event keys never get this far, they fail deserialization.
pub async fn handle(
    copier: &dyn SnapshotCopier,
    request: CopySnapshotRequest,
) -> Result<CopySnapshotResponse, Error> {
    info!(
        snapshot = %request.snapshot_id,
        source_region = %request.source_region,
        "copying snapshot"
    );
    let snapshot_id = copier
        .copy_snapshot(
            &request.source_region,
            &request.snapshot_id,
            &request.description,
        )
        .await?;
    info!(snapshot = %snapshot_id, "snapshot copy started");
    Ok(CopySnapshotResponse { snapshot_id })
}
