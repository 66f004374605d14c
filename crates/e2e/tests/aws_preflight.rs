//! Credential and region preflight for the live suite.
//!
//! Read-only: resolves the caller identity through the configured region
//! and touches nothing else. Cheap to run before a full live scenario.

use runbook_common::HarnessConfig;
use runbook_e2e::fixtures;
use runbook_harness::api::IdentityApi;
use runbook_harness::aws::AwsCloud;

/// Resolves the caller identity with the shipped configuration.
///
/// Marked ignored because it talks to a real AWS endpoint and needs
/// credentials in the environment.
#[tokio::test]
#[ignore]
async fn test_caller_identity_resolves_in_the_configured_region() {
    if std::env::var("RUNBOOK_LIVE").as_deref() != Ok("1") {
        eprintln!("Skipping: set RUNBOOK_LIVE=1 to run preflight against a real account");
        return;
    }

    let config = HarnessConfig::load(&fixtures::config_dir()).expect("load config");
    let clients = AwsCloud::connect(Some(config.general.region.clone())).await;

    let arn = clients
        .identity
        .caller_arn()
        .await
        .expect("resolve caller identity");
    assert!(arn.starts_with("arn:"), "unexpected caller ARN: {arn}");
}
