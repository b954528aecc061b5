//! Control records: persisted settings, persisted constants and the
//! volatile working variables recomputed every tick.
//!
//! Settings change at runtime (user, host, self-learning) and are persisted
//! on every meaningful change. Constants are loaded once and only change on
//! explicit reconfiguration. Variables are never persisted.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::MAX_FILTER_B;
use crate::fixed::{Fixed23_9, Temp};

use super::error::SettingError;
use super::state::{ControlMode, TempFormat};

// ─── Settings ───────────────────────────────────────────────────────

/// Mode, setpoints and learned estimators.
///
/// `beer_setting` is `None` when no beer setpoint applies (fridge-constant
/// mode). `fridge_setting` is `None` until a beer-mode PID has produced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    pub mode: ControlMode,
    pub beer_setting: Option<Temp>,
    pub fridge_setting: Option<Temp>,
    /// Heating overshoot per hour of heating, learned.
    pub heat_estimator: Temp,
    /// Cooling overshoot per hour of cooling, learned.
    pub cool_estimator: Temp,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            mode: ControlMode::Off,
            beer_setting: Some(Temp::from_int(20)),
            fridge_setting: Some(Temp::from_int(20)),
            heat_estimator: Temp::from_raw(102), // 0.2
            cool_estimator: Temp::from_int(5),
        }
    }
}

// ─── Constants ──────────────────────────────────────────────────────

/// Filter `b` selectors per probe. Higher means heavier smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelectors {
    /// Display, logging and on/off control.
    pub fridge_fast: u8,
    /// Peak detection.
    pub fridge_slow: u8,
    /// Computed, not used by any decision.
    pub fridge_slope: u8,
    /// Display and logging.
    pub beer_fast: u8,
    /// PID error input.
    pub beer_slow: u8,
    /// PID derivative input.
    pub beer_slope: u8,
}

impl Default for FilterSelectors {
    fn default() -> Self {
        Self {
            fridge_fast: 1,
            fridge_slow: 4,
            fridge_slope: 3,
            beer_fast: 3,
            beer_slow: 5,
            beer_slope: 4,
        }
    }
}

impl FilterSelectors {
    pub const fn as_array(&self) -> [u8; 6] {
        [
            self.fridge_fast,
            self.fridge_slow,
            self.fridge_slope,
            self.beer_fast,
            self.beer_slow,
            self.beer_slope,
        ]
    }
}

/// Tunable constants: limits, PID gains, target bands, estimator windows,
/// filter selectors.
///
/// Band offsets are relative to the fridge setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConstants {
    pub temp_format: TempFormat,
    pub temp_setting_min: Temp,
    pub temp_setting_max: Temp,
    pub kp: Temp,
    pub ki: Temp,
    pub kd: Temp,
    /// Integrator only accumulates while |beer error| is below this.
    pub i_max_error: Temp,
    /// Stay idle while the fridge is within [low, high] of its setpoint.
    pub idle_range_high: Temp,
    pub idle_range_low: Temp,
    /// A heating peak inside [lower, upper] needs no estimator correction.
    pub heating_target_upper: Temp,
    pub heating_target_lower: Temp,
    /// A cooling peak inside [lower, upper] needs no estimator correction.
    pub cooling_target_upper: Temp,
    pub cooling_target_lower: Temp,
    /// Cap on heating time used for peak estimation, and the peak
    /// detection window after heating stops [s].
    pub max_heat_time_for_estimate: u16,
    /// Same for cooling [s].
    pub max_cool_time_for_estimate: u16,
    pub filters: FilterSelectors,
    /// Drive the chamber light instead of the heater.
    pub light_as_heater: bool,
}

impl Default for ControlConstants {
    fn default() -> Self {
        Self {
            temp_format: TempFormat::Celsius,
            temp_setting_min: Temp::from_int(1),
            temp_setting_max: Temp::from_int(30),
            kp: Temp::from_int(20),
            ki: Temp::from_raw(307), // 0.6
            kd: Temp::from_int(-3),
            i_max_error: Temp::from_raw(256), // 0.5
            idle_range_high: Temp::from_int(1),
            idle_range_low: Temp::from_int(-1),
            heating_target_upper: Temp::from_raw(154), // +0.3
            heating_target_lower: Temp::from_raw(-102), // -0.2
            cooling_target_upper: Temp::from_raw(102), // +0.2
            cooling_target_lower: Temp::from_raw(-154), // -0.3
            max_heat_time_for_estimate: 600,
            max_cool_time_for_estimate: 1200,
            filters: FilterSelectors::default(),
            light_as_heater: false,
        }
    }
}

impl ControlConstants {
    /// Check ordering of limits and bands, filter selector bounds and
    /// estimator windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temp_setting_min >= self.temp_setting_max {
            return Err(ConfigError::ValidationError(format!(
                "temp_setting_min {} must be below temp_setting_max {}",
                self.temp_setting_min, self.temp_setting_max
            )));
        }
        if self.i_max_error <= Temp::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "i_max_error {} must be positive",
                self.i_max_error
            )));
        }
        if self.idle_range_low > Temp::ZERO || self.idle_range_high < Temp::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "idle range [{}, {}] must contain zero",
                self.idle_range_low, self.idle_range_high
            )));
        }
        if self.heating_target_lower > self.heating_target_upper {
            return Err(ConfigError::ValidationError(format!(
                "heating target [{}, {}] is inverted",
                self.heating_target_lower, self.heating_target_upper
            )));
        }
        if self.cooling_target_lower > self.cooling_target_upper {
            return Err(ConfigError::ValidationError(format!(
                "cooling target [{}, {}] is inverted",
                self.cooling_target_lower, self.cooling_target_upper
            )));
        }
        if self.max_heat_time_for_estimate == 0 || self.max_cool_time_for_estimate == 0 {
            return Err(ConfigError::ValidationError(
                "estimate windows must be non-zero".to_string(),
            ));
        }
        if let Some(b) = self
            .filters
            .as_array()
            .into_iter()
            .find(|&b| b > MAX_FILTER_B)
        {
            return Err(ConfigError::ValidationError(format!(
                "filter selector {b} exceeds {MAX_FILTER_B}"
            )));
        }
        Ok(())
    }

    /// Accept a user setpoint only inside the configured limits.
    pub fn check_setpoint(&self, value: Temp) -> Result<Temp, SettingError> {
        if value < self.temp_setting_min || value > self.temp_setting_max {
            return Err(SettingError::OutOfRange {
                value,
                min: self.temp_setting_min,
                max: self.temp_setting_max,
            });
        }
        Ok(value)
    }
}

// ─── Variables ──────────────────────────────────────────────────────

/// Working variables derived each tick. Written only by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlVariables {
    /// Beer setpoint minus slow-filtered beer temperature.
    pub beer_diff: Temp,
    /// Accumulated beer error (23.9 for headroom).
    pub diff_integral: Fixed23_9,
    /// Beer temperature slope [°C/h].
    pub beer_slope: Temp,
    pub p: Temp,
    pub i: Temp,
    pub d: Temp,
    /// Fridge peak predicted for the running cycle.
    pub estimated_peak: Temp,
    /// Estimated peak when the last cooling cycle stopped.
    pub neg_peak_estimate: Temp,
    /// Estimated peak when the last heating cycle stopped.
    pub pos_peak_estimate: Temp,
    /// Last detected fridge minimum.
    pub neg_peak: Temp,
    /// Last detected fridge maximum.
    pub pos_peak: Temp,
}
