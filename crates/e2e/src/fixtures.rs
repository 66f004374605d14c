//! Paths to the fixtures this crate ships.
//!
//! Everything is resolved relative to the crate manifest so the suite can
//! run from any working directory.

use std::path::PathBuf;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Directory holding `defaults.toml` and the optional `local.toml` overlay.
pub fn config_dir() -> PathBuf {
    manifest_dir().join("config")
}

/// CloudFormation template for the throwaway test stack.
pub fn test_stack_template() -> PathBuf {
    manifest_dir().join("templates").join("test-stack.yml")
}

/// A shipped automation document, by file name.
pub fn document_path(file_name: &str) -> PathBuf {
    manifest_dir()
        .join("..")
        .join("..")
        .join("documents")
        .join(file_name)
}

/// The encrypt-root-volume automation document.
pub fn encrypt_root_volume_document() -> PathBuf {
    document_path("encrypt-root-volume.json")
}

/// The copy-snapshot automation document.
pub fn copy_snapshot_document() -> PathBuf {
    document_path("copy-snapshot.json")
}
