//! Runbook Rig common library
//!
//! Shared error taxonomy, retry primitive, layered configuration, and the
//! domain types used across the harness crates.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use error::{HarnessError, RemoteError, RemoteResult, Result};
pub use retry::{wait_until, RetryPolicy};
pub use types::*;

/// Runbook Rig version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
