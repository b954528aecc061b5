//! Chamber thermal simulator.
//!
//! First-order model stepped once per simulated second:
//!
//! - fridge air exchanges heat with ambient (faster while the door is open)
//!   and with the beer
//! - beer exchanges heat with the fridge air only
//! - cooler and heater act through a lagged level, so the fridge keeps
//!   moving after an actuator stops, which is the overshoot the estimators
//!   learn
//!
//! Probe readings can be quantised to 1/16 °C like a one-wire sensor.
//!
//! ```toml
//! [simulation]
//! ambient = 22.0
//! initial_beer = 20.0
//! initial_fridge = 20.0
//! door_schedule = [{ open_at = 3600, close_at = 3660 }]
//! ```

use brew_common::config::ConfigError;
use brew_common::fixed::Temp;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::io::{ChamberIo, DoorSensor, Relay, TempSource};
use crate::state::timers::Seconds;

/// Ambient exchange multiplier while the door is open.
const DOOR_OPEN_EXCHANGE: f64 = 20.0;

/// One-wire probe resolution.
const QUANTUM: f64 = 1.0 / 16.0;

/// Door open interval `[open_at, close_at)` in simulated seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoorWindow {
    pub open_at: Seconds,
    pub close_at: Seconds,
}

/// Chamber model parameters. Temperatures in °C, rates per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ambient: f64,
    pub initial_beer: f64,
    pub initial_fridge: f64,
    /// Fraction of the ambient/fridge difference exchanged per second.
    pub fridge_ambient_coupling: f64,
    /// Fraction of the beer/fridge difference the air takes per second.
    pub fridge_beer_coupling: f64,
    /// Same from the beer side; smaller, the beer has more thermal mass.
    pub beer_fridge_coupling: f64,
    /// Fridge cooling rate at full coil level [°C/s].
    pub cooler_power: f64,
    /// Fridge heating rate at full element level [°C/s].
    pub heater_power: f64,
    /// Coil level approach rate towards the relay state per second.
    pub coil_lag: f64,
    /// Same for the heating element.
    pub element_lag: f64,
    /// Round probe readings to 1/16 °C.
    pub quantize: bool,
    pub door_schedule: Vec<DoorWindow>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ambient: 22.0,
            initial_beer: 20.0,
            initial_fridge: 20.0,
            fridge_ambient_coupling: 0.0008,
            fridge_beer_coupling: 0.002,
            beer_fridge_coupling: 0.0002,
            cooler_power: 0.02,
            heater_power: 0.02,
            coil_lag: 0.01,
            element_lag: 0.05,
            quantize: true,
            door_schedule: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("fridge_ambient_coupling", self.fridge_ambient_coupling),
            ("fridge_beer_coupling", self.fridge_beer_coupling),
            ("beer_fridge_coupling", self.beer_fridge_coupling),
            ("coil_lag", self.coil_lag),
            ("element_lag", self.element_lag),
        ];
        if let Some((name, v)) = rates.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(ConfigError::ValidationError(format!(
                "{name} = {v} must be within [0, 1]"
            )));
        }
        if self.cooler_power < 0.0 || self.heater_power < 0.0 {
            return Err(ConfigError::ValidationError(
                "actuator power cannot be negative".to_string(),
            ));
        }
        for t in [self.ambient, self.initial_beer, self.initial_fridge] {
            if !(-40.0..=60.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "temperature {t} outside the 7.9 range"
                )));
            }
        }
        if let Some(w) = self.door_schedule.iter().find(|w| w.close_at <= w.open_at) {
            return Err(ConfigError::ValidationError(format!(
                "door window {}..{} is empty",
                w.open_at, w.close_at
            )));
        }
        Ok(())
    }
}

/// Simulated probe. Reports the last value written by the model.
#[derive(Debug, Clone, Copy)]
pub struct SimProbe {
    value: f64,
    quantize: bool,
    connected: bool,
}

impl SimProbe {
    fn new(value: f64, quantize: bool) -> Self {
        Self {
            value,
            quantize,
            connected: true,
        }
    }
}

impl TempSource for SimProbe {
    fn read(&mut self) -> Option<Temp> {
        if !self.connected {
            return None;
        }
        let v = if self.quantize {
            (self.value / QUANTUM).round() * QUANTUM
        } else {
            self.value
        };
        Some(Temp::from_f64(v))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimDoor {
    open: bool,
}

impl DoorSensor for SimDoor {
    fn is_open(&self) -> bool {
        self.open
    }
}

/// Which simulated probe to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Beer,
    Fridge,
}

/// Simulated chamber with its probes, door and relays.
#[derive(Debug, Clone)]
pub struct Chamber {
    config: SimulationConfig,
    beer: f64,
    fridge: f64,
    coil_level: f64,
    element_level: f64,
    beer_probe: SimProbe,
    fridge_probe: SimProbe,
    door: SimDoor,
    /// Manual override, wins over the schedule.
    door_forced: Option<bool>,
    cooler: Relay,
    heater: Relay,
    light: Relay,
    fan: Relay,
    last_step: Option<Seconds>,
}

impl Chamber {
    pub fn new(config: SimulationConfig) -> Self {
        let quantize = config.quantize;
        Self {
            beer: config.initial_beer,
            fridge: config.initial_fridge,
            coil_level: 0.0,
            element_level: 0.0,
            beer_probe: SimProbe::new(config.initial_beer, quantize),
            fridge_probe: SimProbe::new(config.initial_fridge, quantize),
            door: SimDoor::default(),
            door_forced: None,
            cooler: Relay::default(),
            heater: Relay::default(),
            light: Relay::default(),
            fan: Relay::default(),
            last_step: None,
            config,
        }
    }

    /// Devices for the next control tick.
    pub fn io(&mut self) -> ChamberIo<'_> {
        ChamberIo {
            beer: &mut self.beer_probe,
            fridge: &mut self.fridge_probe,
            door: &self.door,
            cooler: &mut self.cooler,
            heater: &mut self.heater,
            light: Some(&mut self.light),
            fan: Some(&mut self.fan),
        }
    }

    /// Advance the model to `now`, one second at a time, with the relay
    /// states last commanded.
    pub fn step(&mut self, now: Seconds) {
        let elapsed = match self.last_step {
            Some(last) => now.saturating_sub(last),
            None => 1,
        };
        self.last_step = Some(now);

        let was_open = self.door.open;
        self.door.open = self.door_forced.unwrap_or_else(|| self.scheduled_open(now));
        if self.door.open != was_open {
            debug!(now, open = self.door.open, "simulated door");
        }

        for _ in 0..elapsed {
            self.step_second();
        }
        self.beer_probe.value = self.beer;
        self.fridge_probe.value = self.fridge;
        trace!(now, beer = self.beer, fridge = self.fridge, coil = self.coil_level, "sim step");
    }

    fn step_second(&mut self) {
        let c = &self.config;
        let cooling = if self.cooler.is_active() { 1.0 } else { 0.0 };
        let heating = if self.heater.is_active() { 1.0 } else { 0.0 };
        self.coil_level += (cooling - self.coil_level) * c.coil_lag;
        self.element_level += (heating - self.element_level) * c.element_lag;

        let ambient_rate = if self.door.open {
            (c.fridge_ambient_coupling * DOOR_OPEN_EXCHANGE).min(1.0)
        } else {
            c.fridge_ambient_coupling
        };
        let fridge = self.fridge
            + (c.ambient - self.fridge) * ambient_rate
            + (self.beer - self.fridge) * c.fridge_beer_coupling
            - self.coil_level * c.cooler_power
            + self.element_level * c.heater_power;
        let beer = self.beer + (self.fridge - self.beer) * c.beer_fridge_coupling;
        self.fridge = fridge;
        self.beer = beer;
    }

    fn scheduled_open(&self, now: Seconds) -> bool {
        self.config
            .door_schedule
            .iter()
            .any(|w| (w.open_at..w.close_at).contains(&now))
    }

    // ─── Test hooks ─────────────────────────────────────────────────

    /// Simulate a probe falling off the bus, or coming back.
    pub fn set_probe_connected(&mut self, probe: Probe, connected: bool) {
        match probe {
            Probe::Beer => self.beer_probe.connected = connected,
            Probe::Fridge => self.fridge_probe.connected = connected,
        }
    }

    /// Force the door state; `None` returns to the schedule.
    pub fn force_door(&mut self, open: Option<bool>) {
        self.door_forced = open;
    }

    /// Overwrite a model temperature, e.g. a warm batch pitched in.
    pub fn set_temperature(&mut self, probe: Probe, value: f64) {
        match probe {
            Probe::Beer => self.beer = value,
            Probe::Fridge => self.fridge = value,
        }
    }

    // ─── Getters ────────────────────────────────────────────────────

    #[inline]
    pub fn beer(&self) -> f64 {
        self.beer
    }

    #[inline]
    pub fn fridge(&self) -> f64 {
        self.fridge
    }

    #[inline]
    pub fn cooler_on(&self) -> bool {
        self.cooler.is_active()
    }

    #[inline]
    pub fn heater_on(&self) -> bool {
        self.heater.is_active()
    }

    #[inline]
    pub fn light_on(&self) -> bool {
        self.light.is_active()
    }

    #[inline]
    pub fn fan_on(&self) -> bool {
        self.fan.is_active()
    }

    #[inline]
    pub fn door_open(&self) -> bool {
        self.door.open
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
