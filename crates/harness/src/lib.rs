//! Runbook Rig harness
//!
//! End-to-end verification for SSM automation runbooks:
//! - Provisions a throwaway CloudFormation stack per scenario
//! - Registers (or refreshes) the automation document and requires Active
//! - Triggers an execution and polls it to a terminal outcome
//! - Asserts on the resulting infrastructure state
//! - Tears everything down in reverse order, on every exit path
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ScenarioDriver                                              │
//! │    ├── StackController    ── StackApi ───────┐               │
//! │    ├── DocumentController ── DocumentApi ────┤               │
//! │    ├── ExecutionPoller    ── DocumentApi ────┼── AwsCloud    │
//! │    ├── verify_role_assumable ── IdentityApi ─┤   MockCloud   │
//! │    ├── Scenario::verify   ── ComputeApi ─────┘               │
//! │    └── CleanupPlan (reverse-order release, never propagates) │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod aws;
pub mod cleanup;
pub mod document;
pub mod execution;
pub mod mock;
pub mod scenario;
pub mod stack;

pub use api::{CloudClients, RootVolume};
pub use cleanup::{CleanupOutcome, CleanupPlan, CleanupStep};
pub use document::DocumentController;
pub use execution::ExecutionPoller;
pub use mock::MockCloud;
pub use scenario::{verify_role_assumable, Scenario, ScenarioDriver, ScenarioReport, Stage};
pub use stack::StackController;
