//! Workspace configuration, loaded from `<root>/.snapback/config.json`

use crate::services::coordinator::capture::CaptureLimits;
use crate::services::debounce::DEFAULT_DEBOUNCE_MS;
use crate::services::decision::DecisionConfig;
use crate::services::notification::NotificationConfig;
use crate::services::orchestrator::StorageConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".snapback";
pub const CONFIG_FILE: &str = "config.json";
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapbackConfig {
    pub decision: DecisionConfig,
    pub storage: StorageConfig,
    pub capture: CaptureLimits,
    pub notification: NotificationConfig,
    pub debounce_ms: u64,
}

impl Default for SnapbackConfig {
    fn default() -> Self {
        Self {
            decision: DecisionConfig::default(),
            storage: StorageConfig::default(),
            capture: CaptureLimits::default(),
            notification: NotificationConfig::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl SnapbackConfig {
    /// Read a config file. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::Serialization(format!("{}: {e}", path.display()))
        })?;

        Ok(Self {
            decision: config.decision.sanitized(),
            ..config
        })
    }

    /// Load the config that belongs to a workspace root
    pub fn for_workspace<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::load(config_path(root))
    }
}

#[must_use]
pub fn config_path<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Key-value state file for a workspace root
#[must_use]
pub fn state_path<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join(CONFIG_DIR).join(STATE_FILE)
}
