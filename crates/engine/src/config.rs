//! Recovery configuration via `recovery.toml`
//!
//! The hosting process points the daemon at a config file. Every key is
//! optional; a missing file can be created with the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tandem_core::{Error, Result};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "recovery.toml";

/// Default interval between periodic sweeps
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Recovery daemon configuration
///
/// # Example
///
/// ```toml
/// # Interval between periodic recovery sweeps, in milliseconds
/// sweep_interval_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Interval between periodic sweeps in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Run one sweep as soon as the daemon starts
    #[serde(default)]
    pub sweep_on_start: bool,
}

fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MS
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            sweep_on_start: false,
        }
    }
}

impl RecoveryConfig {
    /// Interval between sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_ms == 0 {
            return Err(Error::invalid_state(
                "sweep_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Tandem recovery configuration
#
# Interval between periodic recovery sweeps, in milliseconds (default: 60000).
# Each sweep retries every transaction still awaiting recovery.
sweep_interval_ms = 60000

# Run one sweep as soon as the daemon starts (default: false).
sweep_on_start = false
"#
    }

    /// Read and parse config from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecoveryConfig = toml::from_str(&content).map_err(|e| {
            Error::Serialization(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }
}
