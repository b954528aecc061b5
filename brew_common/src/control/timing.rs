//! Minimum dwell times protecting the compressor and heater.
//!
//! ```toml
//! [timing]
//! min_cool_off_time = 300
//! min_switch_time = 600
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{
    MIN_COOL_OFF_TIME, MIN_COOL_OFF_TIME_FRIDGE_CONSTANT, MIN_COOL_ON_TIME, MIN_HEAT_OFF_TIME,
    MIN_HEAT_ON_TIME, MIN_SWITCH_TIME,
};

/// Dwell times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellTimes {
    pub min_cool_off_time: u32,
    pub min_heat_off_time: u32,
    pub min_cool_on_time: u32,
    pub min_heat_on_time: u32,
    /// Replaces `min_cool_off_time` in fridge-constant mode.
    pub min_cool_off_time_fridge_constant: u32,
    /// Between the end of one actuator and the start of the other.
    pub min_switch_time: u32,
}

impl Default for DwellTimes {
    fn default() -> Self {
        Self {
            min_cool_off_time: MIN_COOL_OFF_TIME,
            min_heat_off_time: MIN_HEAT_OFF_TIME,
            min_cool_on_time: MIN_COOL_ON_TIME,
            min_heat_on_time: MIN_HEAT_ON_TIME,
            min_cool_off_time_fridge_constant: MIN_COOL_OFF_TIME_FRIDGE_CONSTANT,
            min_switch_time: MIN_SWITCH_TIME,
        }
    }
}

impl DwellTimes {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("min_cool_off_time", self.min_cool_off_time),
            ("min_heat_off_time", self.min_heat_off_time),
            ("min_cool_on_time", self.min_cool_on_time),
            ("min_heat_on_time", self.min_heat_on_time),
            (
                "min_cool_off_time_fridge_constant",
                self.min_cool_off_time_fridge_constant,
            ),
            ("min_switch_time", self.min_switch_time),
        ];
        if let Some((name, _)) = named.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be non-zero"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_compressor_limits() {
        let t = DwellTimes::default();
        assert_eq!(t.min_cool_off_time, 300);
        assert_eq!(t.min_cool_off_time_fridge_constant, 900);
        assert_eq!(t.min_switch_time, 600);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn zero_dwell_rejected() {
        let t: DwellTimes = toml::from_str("min_heat_on_time = 0").unwrap();
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("min_heat_on_time"));
    }
}
