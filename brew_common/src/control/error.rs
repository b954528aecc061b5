//! Error and outcome types for the control core.
//!
//! Nothing in the control core is fatal. Per-tick conditions are reported
//! as [`TickFlags`]; host writes that cannot be applied return
//! [`SettingError`]; undecodable store records return [`RecordError`] and
//! the caller falls back to defaults.

use bitflags::bitflags;
use thiserror::Error;

use crate::fixed::Temp;

use super::state::ControlMode;

bitflags! {
    /// What happened during one control tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TickFlags: u16 {
        /// Beer probe returned no reading; last value held.
        const BEER_SENSOR_LOST     = 0x0001;
        /// Fridge probe returned no reading; last value held.
        const FRIDGE_SENSOR_LOST   = 0x0002;
        /// Door interlock active.
        const DOOR_OPEN            = 0x0004;
        /// A wanted transition is waiting on a dwell-time gate.
        const TRANSITION_DEFERRED  = 0x0008;
        /// State changed this tick.
        const STATE_CHANGED        = 0x0010;
        /// Fridge maximum detected after heating.
        const POS_PEAK_DETECTED    = 0x0020;
        /// Fridge minimum detected after cooling.
        const NEG_PEAK_DETECTED    = 0x0040;
        /// Heat or cool estimator adjusted.
        const ESTIMATOR_UPDATED    = 0x0080;
        /// Peak detection window closed without a peak.
        const PEAK_WINDOW_EXPIRED  = 0x0100;
        /// Settings written to the store.
        const SETTINGS_PERSISTED   = 0x0200;
    }
}

impl TickFlags {
    /// Either probe lost.
    pub const SENSOR_LOST_MASK: Self = Self::from_bits_truncate(
        Self::BEER_SENSOR_LOST.bits() | Self::FRIDGE_SENSOR_LOST.bits(),
    );

    #[inline]
    pub const fn has_sensor_fault(&self) -> bool {
        self.intersects(Self::SENSOR_LOST_MASK)
    }
}

impl Default for TickFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A host or user write that was rejected. The previous value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("setpoint {value} outside [{min}, {max}]")]
    OutOfRange { value: Temp, min: Temp, max: Temp },

    #[error("unknown mode code {0:#04x}")]
    UnknownMode(u8),

    /// E.g. a fridge setpoint while the PID owns the fridge setpoint.
    #[error("setpoint not applicable in mode {mode}")]
    NotApplicable { mode: ControlMode },
}

/// A persisted record that could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid {field} byte {value:#04x}")]
    InvalidByte { field: &'static str, value: u8 },

    #[error("store format {found} does not match {expected}")]
    FormatMismatch { found: u8, expected: u8 },
}
