//! Boundary to the chamber hardware.
//!
//! The control loop only sees these traits. Probes may fail a read, and
//! actuator state is never read back: the loop tracks what it asked for.

use brew_common::fixed::Temp;

/// A temperature probe. `None` means no valid reading this tick.
pub trait TempSource {
    fn read(&mut self) -> Option<Temp>;
}

/// An on/off output such as a compressor relay or heater.
pub trait Actuator {
    fn set_active(&mut self, active: bool);
}

/// Door switch, polled once per tick.
pub trait DoorSensor {
    fn is_open(&self) -> bool;
}

/// Devices for one tick.
pub struct ChamberIo<'a> {
    pub beer: &'a mut dyn TempSource,
    pub fridge: &'a mut dyn TempSource,
    pub door: &'a dyn DoorSensor,
    pub cooler: &'a mut dyn Actuator,
    pub heater: &'a mut dyn Actuator,
    /// Chamber light: on while the door is open, or as heater.
    pub light: Option<&'a mut dyn Actuator>,
    /// Circulation fan: on while heating or cooling.
    pub fan: Option<&'a mut dyn Actuator>,
}

/// Relay wired active-low.
#[derive(Debug, Clone, Default)]
pub struct Inverted<A>(pub A);

impl<A: Actuator> Actuator for Inverted<A> {
    fn set_active(&mut self, active: bool) {
        self.0.set_active(!active);
    }
}

/// Chamber without a door switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDoor;

impl DoorSensor for NoDoor {
    fn is_open(&self) -> bool {
        false
    }
}

/// Actuator that remembers the last command. Used for unwired outputs and
/// in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relay {
    active: bool,
}

impl Relay {
    #[inline]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

impl Actuator for Relay {
    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
