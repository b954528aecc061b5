//! Mode and state enums shared by the controller and its host link.
//!
//! All enums use `#[repr(u8)]` and carry `from_u8`/`from_code` decoders so
//! they survive the byte-level settings store and host protocol unchanged.

use core::fmt;

use serde::{Deserialize, Serialize};

// ─── Operating mode ─────────────────────────────────────────────────

/// Operating mode selected by the user or host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ControlMode {
    /// Controller disabled, actuators off.
    #[default]
    Off = b'o',
    /// Hold the beer at a constant setpoint; fridge setpoint follows the PID.
    BeerConstant = b'b',
    /// Hold the fridge air at a constant setpoint; no beer setpoint.
    FridgeConstant = b'f',
    /// Beer setpoint driven by an external temperature profile.
    BeerProfile = b'p',
    /// State machine runs, actuators are left to manual control.
    Test = b't',
}

impl ControlMode {
    /// Decode the single-character host/store code.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            b'o' => Some(Self::Off),
            b'b' => Some(Self::BeerConstant),
            b'f' => Some(Self::FridgeConstant),
            b'p' => Some(Self::BeerProfile),
            b't' => Some(Self::Test),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Modes where the fridge setpoint is derived from the beer setpoint.
    #[inline]
    pub const fn is_beer_mode(self) -> bool {
        matches!(self, Self::BeerConstant | Self::BeerProfile)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "Off",
            Self::BeerConstant => "Beer Const.",
            Self::FridgeConstant => "Fridge Const.",
            Self::BeerProfile => "Beer Profile",
            Self::Test => "** Testing **",
        };
        f.write_str(name)
    }
}

// ─── Controller state ───────────────────────────────────────────────

/// Controller state tag. Actuator outputs are a pure function of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ControlState {
    /// No actuator active.
    Idle = 0,
    /// Post-boot grace state before the first actuator decision.
    #[default]
    Startup = 1,
    /// Disabled by the user.
    Off = 2,
    /// Door interlock, preempts everything.
    DoorOpen = 3,
    Heating = 4,
    Cooling = 5,
}

impl ControlState {
    /// Number of states, for host tables indexed by tag.
    pub const COUNT: usize = 6;

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Startup),
            2 => Some(Self::Off),
            3 => Some(Self::DoorOpen),
            4 => Some(Self::Heating),
            5 => Some(Self::Cooling),
            _ => None,
        }
    }

    /// States that drive an actuator.
    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Heating | Self::Cooling)
    }

    /// States from which a new heating/cooling decision is evaluated.
    #[inline]
    pub const fn is_resting(self) -> bool {
        matches!(self, Self::Idle | Self::Startup | Self::Off)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Startup => "Starting up",
            Self::Off => "Off",
            Self::DoorOpen => "Door open",
            Self::Heating => "Heating",
            Self::Cooling => "Cooling",
        };
        f.write_str(name)
    }
}

// ─── Display format ─────────────────────────────────────────────────

/// Temperature unit used by the display and host link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TempFormat {
    #[default]
    #[serde(rename = "C")]
    Celsius = b'C',
    #[serde(rename = "F")]
    Fahrenheit = b'F',
}

impl TempFormat {
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            b'C' => Some(Self::Celsius),
            b'F' => Some(Self::Fahrenheit),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_codes_round_trip() {
        for mode in [
            ControlMode::Off,
            ControlMode::BeerConstant,
            ControlMode::FridgeConstant,
            ControlMode::BeerProfile,
            ControlMode::Test,
        ] {
            assert_eq!(ControlMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(ControlMode::from_code(b'x'), None);
    }

    #[test]
    fn beer_modes() {
        assert!(ControlMode::BeerConstant.is_beer_mode());
        assert!(ControlMode::BeerProfile.is_beer_mode());
        assert!(!ControlMode::FridgeConstant.is_beer_mode());
        assert!(!ControlMode::Off.is_beer_mode());
    }

    #[test]
    fn state_tags_are_dense() {
        for raw in 0..ControlState::COUNT as u8 {
            let state = ControlState::from_u8(raw).unwrap();
            assert_eq!(state as u8, raw);
        }
        assert_eq!(ControlState::from_u8(ControlState::COUNT as u8), None);
    }

    #[test]
    fn state_classes() {
        assert!(ControlState::Heating.is_active());
        assert!(ControlState::Cooling.is_active());
        assert!(!ControlState::DoorOpen.is_active());
        assert!(ControlState::Startup.is_resting());
        assert!(!ControlState::DoorOpen.is_resting());
        assert_eq!(ControlState::default(), ControlState::Startup);
    }

    #[test]
    fn format_parses_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: TempFormat,
        }
        let w: Wrapper = toml::from_str("format = \"F\"").unwrap();
        assert_eq!(w.format, TempFormat::Fahrenheit);
    }
}
