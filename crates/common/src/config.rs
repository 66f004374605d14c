//! Layered harness configuration
//!
//! A run reads `defaults.toml` from a config directory, then overlays an
//! optional `local.toml` on top of it (table-by-table deep merge). The
//! result is immutable for the rest of the run and passed by reference.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// General run settings
    pub general: GeneralConfig,

    /// Linux test instance settings
    pub linux: LinuxConfig,

    /// Windows test instance settings
    pub windows: WindowsConfig,
}

/// General run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Region the harness provisions into
    pub region: String,

    /// Prefix stamped onto every provisioned resource name
    pub resource_prefix: String,

    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            resource_prefix: "runbook-rig-".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Linux test instance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxConfig {
    /// AMI launched by the test stack
    pub ami: String,

    /// Instance type launched by the test stack
    pub instance_type: String,
}

impl Default for LinuxConfig {
    fn default() -> Self {
        Self {
            ami: String::new(),
            instance_type: "t2.small".to_string(),
        }
    }
}

/// Windows test instance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsConfig {
    /// Instance type launched by the test stack
    pub instance_type: String,

    /// AMI per region; Windows images differ across regions
    pub amis: BTreeMap<String, String>,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            instance_type: "t2.medium".to_string(),
            amis: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a directory.
    ///
    /// `defaults.toml` must exist; `local.toml` is overlaid when present.
    pub fn load(dir: &Path) -> Result<Self> {
        let defaults_path = dir.join("defaults.toml");
        let defaults = std::fs::read_to_string(&defaults_path).map_err(|source| {
            HarnessError::FileRead {
                path: defaults_path.display().to_string(),
                source,
            }
        })?;
        let mut merged: toml::Value = toml::from_str(&defaults)?;

        let local_path = dir.join("local.toml");
        if local_path.exists() {
            let local = std::fs::read_to_string(&local_path).map_err(|source| {
                HarnessError::FileRead {
                    path: local_path.display().to_string(),
                    source,
                }
            })?;
            merge_value(&mut merged, toml::from_str(&local)?);
        }

        Ok(merged.try_into()?)
    }

    /// Prefixed name for a provisioned resource
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}{}", self.general.resource_prefix, suffix)
    }

    /// Windows AMI for a region, if one is configured
    pub fn windows_ami(&self, region: &str) -> Option<&str> {
        self.windows.amis.get(region).map(String::as_str)
    }
}

/// Overlay `overlay` onto `base`. Tables merge key by key, everything else
/// is replaced wholesale.
fn merge_value(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(slot) if slot.is_table() && value.is_table() => {
                        merge_value(slot, value);
                    }
                    _ => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
