//! Error types for the runbook harness

use thiserror::Error;

use crate::types::{DocumentStatus, ExecutionOutcome};

/// Result type alias using the harness error
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Result of a single remote call, before harness-level interpretation
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Classified failure of a remote call.
///
/// The retry primitive branches on this tag alone: `Transient` is worth
/// another attempt, everything else aborts the wait immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Harness error types
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("{what} not ready after {attempts} attempts: {last}")]
    Exhausted {
        what: String,
        attempts: u32,
        #[source]
        last: RemoteError,
    },

    #[error("Stack {name} creation failed: {reason}")]
    StackCreateFailed { name: String, reason: String },

    #[error("Stack {name} deletion failed: {reason}")]
    StackDeleteFailed { name: String, reason: String },

    #[error("Stack {name} has no readable outputs while {lifecycle}")]
    StackOutputsUnavailable { name: String, lifecycle: String },

    #[error("Stack output {key} is missing")]
    MissingOutput { key: String },

    #[error("Document {name} registration failed with status {status}")]
    DocumentRegistrationFailed { name: String, status: DocumentStatus },

    #[error("Refusing to execute document {name} with status {status}")]
    ExecutionTriggerFailed { name: String, status: DocumentStatus },

    #[error("Execution {id} finished as {outcome}")]
    ExecutionFailed { id: String, outcome: ExecutionOutcome },

    #[error("Execution {id} still running after {waited_secs}s")]
    ExecutionWaitCeiling { id: String, waited_secs: u64 },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Scenario aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_classification() {
        assert!(RemoteError::Transient("throttled".into()).is_transient());
        assert!(!RemoteError::Fatal("boom".into()).is_transient());
        assert!(RemoteError::NotFound("gone".into()).is_not_found());
        assert!(!RemoteError::Transient("slow".into()).is_not_found());
    }

    #[test]
    fn test_exhausted_keeps_last_remote_error() {
        let err = HarnessError::Exhausted {
            what: "role probe".into(),
            attempts: 12,
            last: RemoteError::Transient("AccessDenied".into()),
        };
        let text = err.to_string();
        assert!(text.contains("role probe"));
        assert!(text.contains("12 attempts"));
        assert!(text.contains("AccessDenied"));
    }

    #[test]
    fn test_remote_error_converts_into_harness_error() {
        let err: HarnessError = RemoteError::Fatal("expired token".into()).into();
        assert!(matches!(err, HarnessError::Remote(RemoteError::Fatal(_))));
    }
}
