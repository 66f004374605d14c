//! Lambda entry point for the copy-snapshot runbook handler

use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

use runbook_lambda::{handle, CopySnapshotRequest, CopySnapshotResponse, Ec2SnapshotCopier};

async fn handle_event(
    copier: &Ec2SnapshotCopier,
    event: LambdaEvent<CopySnapshotRequest>,
) -> Result<CopySnapshotResponse, Error> {
    handle(copier, event.payload).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .init();

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let copier = Ec2SnapshotCopier::new(aws_sdk_ec2::Client::new(&config));

    run(service_fn(|event: LambdaEvent<CopySnapshotRequest>| {
        handle_event(&copier, event)
    }))
    .await
}
