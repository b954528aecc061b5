//! Shared fixtures for the integration scenarios.

mod cooling_cycle;
mod door;
mod learning;
mod persistence;

use brew_common::control::settings::{ControlConstants, ControlSettings};
use brew_common::control::state::ControlMode;
use brew_common::control::timing::DwellTimes;
use brew_common::fixed::Temp;

use brew_control_unit::controller::{ControlLoop, TickReport};
use brew_control_unit::io::{ChamberIo, DoorSensor, Relay, TempSource};
use brew_control_unit::sim::Chamber;
use brew_control_unit::state::timers::Seconds;
use brew_control_unit::store::{MemoryStore, SettingsStore};

/// Probe whose reading the test sets directly.
pub struct ScriptedProbe(pub Option<Temp>);

impl ScriptedProbe {
    pub fn set(&mut self, degrees: f64) {
        self.0 = Some(Temp::from_f64(degrees));
    }
}

impl TempSource for ScriptedProbe {
    fn read(&mut self) -> Option<Temp> {
        self.0
    }
}

pub struct ScriptedDoor(pub bool);

impl DoorSensor for ScriptedDoor {
    fn is_open(&self) -> bool {
        self.0
    }
}

/// Scripted probes and door with plain relays.
pub struct Rig {
    pub beer: ScriptedProbe,
    pub fridge: ScriptedProbe,
    pub door: ScriptedDoor,
    pub cooler: Relay,
    pub heater: Relay,
    pub light: Relay,
    pub fan: Relay,
}

impl Rig {
    pub fn new(beer: f64, fridge: f64) -> Self {
        Self {
            beer: ScriptedProbe(Some(Temp::from_f64(beer))),
            fridge: ScriptedProbe(Some(Temp::from_f64(fridge))),
            door: ScriptedDoor(false),
            cooler: Relay::default(),
            heater: Relay::default(),
            light: Relay::default(),
            fan: Relay::default(),
        }
    }

    pub fn tick<S: SettingsStore>(&mut self, ctl: &mut ControlLoop<S>, now: Seconds) -> TickReport {
        let mut io = ChamberIo {
            beer: &mut self.beer,
            fridge: &mut self.fridge,
            door: &self.door,
            cooler: &mut self.cooler,
            heater: &mut self.heater,
            light: Some(&mut self.light),
            fan: Some(&mut self.fan),
        };
        ctl.tick(now, &mut io)
    }
}

/// Step the simulated chamber and tick the controller for every second in
/// `from..=to`. Returns the reports in order.
pub fn run_chamber<S: SettingsStore>(
    ctl: &mut ControlLoop<S>,
    chamber: &mut Chamber,
    from: Seconds,
    to: Seconds,
) -> Vec<TickReport> {
    (from..=to)
        .map(|now| {
            chamber.step(now);
            ctl.tick(now, &mut chamber.io())
        })
        .collect()
}

pub fn fridge_constant(setting: f64, constants: ControlConstants) -> ControlLoop<MemoryStore> {
    let settings = ControlSettings {
        mode: ControlMode::FridgeConstant,
        beer_setting: None,
        fridge_setting: Some(Temp::from_f64(setting)),
        ..Default::default()
    };
    ControlLoop::new(
        MemoryStore::new(),
        settings,
        constants,
        DwellTimes::default(),
        0,
    )
}

pub fn beer_constant(setting: f64) -> ControlLoop<MemoryStore> {
    let settings = ControlSettings {
        mode: ControlMode::BeerConstant,
        beer_setting: Some(Temp::from_f64(setting)),
        fridge_setting: None,
        ..Default::default()
    };
    ControlLoop::new(
        MemoryStore::new(),
        settings,
        ControlConstants::default(),
        DwellTimes::default(),
        0,
    )
}
