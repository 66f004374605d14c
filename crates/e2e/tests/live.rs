//! Live scenario runner entry point
//!
//! This test binary provisions real resources (an instance, a KMS key, an
//! IAM role) and bills real money, so it only runs when RUNBOOK_LIVE=1.
//! Run with: RUNBOOK_LIVE=1 cargo test --package runbook-e2e --test live

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use runbook_common::HarnessConfig;
use runbook_e2e::{fixtures, EncryptRootVolume};
use runbook_harness::aws::AwsCloud;
use runbook_harness::{
    DocumentController, ExecutionPoller, Scenario, ScenarioDriver, StackController,
};

#[derive(Parser, Debug)]
#[command(name = "runbook-live")]
#[command(about = "Live scenario runner for the automation runbooks")]
struct Args {
    /// Directory holding defaults.toml and the optional local.toml
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Region override on top of the config
    #[arg(long)]
    region: Option<String>,

    /// Write the scenario report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    if std::env::var("RUNBOOK_LIVE").as_deref() != Ok("1") {
        eprintln!("Skipping: set RUNBOOK_LIVE=1 to run scenarios against a real account");
        std::process::exit(0);
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(passed) => {
            if passed {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let config_dir = args.config_dir.unwrap_or_else(fixtures::config_dir);
    let mut config = HarnessConfig::load(&config_dir)?;
    if let Some(region) = args.region {
        config.general.region = region;
    }

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    if config.linux.ami.is_empty() {
        anyhow::bail!("linux.ami is not configured; set it in {}/local.toml", config_dir.display());
    }

    let clients = AwsCloud::connect(Some(config.general.region.clone())).await;
    let scenario = EncryptRootVolume::from_config(&config);

    // One prefixed name for both the stack and the document, so leaked
    // resources are easy to spot in the console.
    let name = config.resource_name(scenario.name());
    info!(
        region = %config.general.region,
        resources = %name,
        "running live scenario"
    );
    let stack = StackController::new(
        clients.stacks.clone(),
        &name,
        fixtures::test_stack_template(),
    );
    let document = DocumentController::new(
        clients.documents.clone(),
        &name,
        fixtures::encrypt_root_volume_document(),
    );
    let poller = ExecutionPoller::new(clients.documents.clone());
    let driver = ScenarioDriver::new(clients, stack, document, poller);

    let report = driver.run(&scenario).await;

    for step in &report.cleanup {
        if !step.succeeded {
            eprintln!(
                "cleanup {} failed: {}",
                step.step,
                step.error.as_deref().unwrap_or("unknown")
            );
        }
    }
    match &report.failure {
        Some(failure) => eprintln!("{}: FAILED: {failure}", report.name),
        None => println!("{}: PASSED ({} ms)", report.name, report.duration_ms),
    }

    if let Some(path) = args.output {
        report.write_json(&path)?;
        println!("report written to {}", path.display());
    }

    Ok(report.passed)
}
