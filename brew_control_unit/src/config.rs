//! Controller configuration file.
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "chamber-1"
//!
//! [constants]
//! kp = 20
//! idle_range_high = 1.0
//! idle_range_low = -1.0
//!
//! [timing]
//! min_cool_off_time = 300
//!
//! [simulation]
//! ambient = 22.0
//! ```
//!
//! Every section is optional. Constants from the file seed a blank store;
//! a valid stored record takes precedence at boot.

use std::path::Path;

use brew_common::config::{ConfigError, ConfigLoader, SharedConfig};
use brew_common::control::settings::ControlConstants;
use brew_common::control::timing::DwellTimes;
use serde::{Deserialize, Serialize};

use crate::sim::SimulationConfig;

// ─── Config Bundle ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub shared: SharedConfig,
    pub constants: ControlConstants,
    pub timing: DwellTimes,
    pub simulation: SimulationConfig,
}

impl ControllerConfig {
    /// Run every section's validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.constants.validate()?;
        self.timing.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the controller configuration.
pub fn load_config(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate configuration text.
pub fn load_config_from_str(content: &str) -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig::from_toml(content)?;
    config.validate()?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
