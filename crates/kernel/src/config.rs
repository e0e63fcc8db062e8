//! Kernel configuration.

use serde::{Deserialize, Serialize};

use crate::Tolerance;
use crate::error::KernelError;

/// Settings shared by every entry point through [`crate::KernelContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Geometric comparison thresholds.
    pub tolerance: Tolerance,
    /// Maximum number of committed requests kept for undo.
    pub history_limit: usize,
    /// Run a topology audit after every commit and log violations.
    pub audit_on_commit: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            history_limit: 100,
            audit_on_commit: false,
        }
    }
}

impl KernelConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig =
            serde_json::from_str(json).map_err(|e| KernelError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.history_limit == 0 {
            return Err(KernelError::InvalidConfig(
                "history_limit must be at least 1".into(),
            ));
        }
        if !(self.tolerance.coincidence > 0.0) {
            return Err(KernelError::InvalidConfig(
                "tolerance.coincidence must be positive".into(),
            ));
        }
        Ok(())
    }
}
