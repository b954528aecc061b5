//! Chamber state machine: Idle, Startup, Off, DoorOpen, Heating, Cooling.
//!
//! Outputs are a pure function of the state; every hysteresis and lockout
//! rule lives in the transitions:
//!
//! - DoorOpen preempts everything and releases to Idle, never directly to
//!   an active state.
//! - Off mode forces Off. A lost fridge probe, a lost beer probe in a beer
//!   mode, or an absent fridge setpoint force Idle.
//! - Cooling starts above `setting + idle_range_high` once the cool-off
//!   time (longer in fridge-constant mode) and the switch time since
//!   heating have passed. Heating mirrors this below `setting + idle_range_low`.
//! - An active state stops when the predicted peak reaches the setpoint,
//!   but not before its minimum on time.
//!
//! A closed gate defers the transition; it is never an error.

use brew_common::control::settings::{ControlConstants, ControlSettings, ControlVariables};
use brew_common::control::state::{ControlMode, ControlState};
use brew_common::control::timing::DwellTimes;
use brew_common::consts::SECONDS_PER_HOUR;
use brew_common::fixed::Temp;

use super::timers::{DwellTimers, Seconds, WaitTime};

/// Per-tick observations the machine decides on.
#[derive(Debug, Clone, Copy)]
pub struct StateInputs {
    pub now: Seconds,
    pub door_open: bool,
    pub fridge_connected: bool,
    pub beer_connected: bool,
    pub fridge_fast: Temp,
}

/// Result of one state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOutcome {
    /// No change.
    Held(ControlState),
    /// State changed this tick.
    Changed { from: ControlState, to: ControlState },
    /// A transition is wanted but a dwell gate is closed for `wait` more
    /// seconds.
    Deferred {
        state: ControlState,
        wanted: ControlState,
        wait: Seconds,
    },
}

impl StateOutcome {
    /// State after the update.
    pub const fn state(&self) -> ControlState {
        match *self {
            Self::Held(s) => s,
            Self::Changed { to, .. } => to,
            Self::Deferred { state, .. } => state,
        }
    }
}

/// How an update ended or overrode a heating or cooling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// The active state stopped on its predicted peak. Only such a cycle
    /// has an overshoot worth learning from.
    Completed(ControlState),
    /// Door, Off mode, a lost probe or an absent setpoint took over from
    /// the temperature rules.
    Overridden,
}

enum Decision {
    Go(ControlState),
    Defer { wanted: ControlState, wait: WaitTime },
}

/// State tag plus the dwell timers guarding its transitions.
#[derive(Debug, Clone)]
pub struct TempStateMachine {
    state: ControlState,
    timers: DwellTimers,
    dwell: DwellTimes,
    event: Option<CycleEvent>,
}

impl TempStateMachine {
    /// New machine in Startup. Dwell timers start at `boot`.
    pub const fn new(dwell: DwellTimes, boot: Seconds) -> Self {
        Self {
            state: ControlState::Startup,
            timers: DwellTimers::new(boot),
            dwell,
            event: None,
        }
    }

    #[inline]
    pub const fn state(&self) -> ControlState {
        self.state
    }

    #[inline]
    pub const fn timers(&self) -> &DwellTimers {
        &self.timers
    }

    #[inline]
    pub const fn dwell(&self) -> &DwellTimes {
        &self.dwell
    }

    /// Cycle event of the last update, if any.
    #[inline]
    pub const fn cycle_event(&self) -> Option<CycleEvent> {
        self.event
    }

    #[inline]
    pub const fn time_in_state(&self, now: Seconds) -> Seconds {
        self.timers.time_in_state(now)
    }

    /// Jump to `state` outside the normal rules, e.g. Idle after a mode
    /// change so the next tick re-evaluates from scratch.
    pub fn force(&mut self, state: ControlState, now: Seconds) {
        if state != self.state {
            self.state = state;
            self.timers.mark_state_change(now);
        }
    }

    /// Advance one tick. Writes the running peak prediction and, when an
    /// active state stops, the stop-time estimate into `vars`.
    pub fn update(
        &mut self,
        input: &StateInputs,
        cs: &ControlSettings,
        cc: &ControlConstants,
        vars: &mut ControlVariables,
    ) -> StateOutcome {
        let from = self.state;
        self.event = None;
        match self.decide(input, cs, cc, vars) {
            Decision::Go(to) if to == from => StateOutcome::Held(from),
            Decision::Go(to) => {
                self.state = to;
                self.timers.mark_state_change(input.now);
                StateOutcome::Changed { from, to }
            }
            Decision::Defer { wanted, wait } => {
                // A deferred start from Off still leaves Off.
                let state = if from == ControlState::Off {
                    ControlState::Idle
                } else {
                    from
                };
                if state != from {
                    self.state = state;
                    self.timers.mark_state_change(input.now);
                }
                StateOutcome::Deferred {
                    state,
                    wanted,
                    wait: wait.remaining(),
                }
            }
        }
    }

    fn decide(
        &mut self,
        input: &StateInputs,
        cs: &ControlSettings,
        cc: &ControlConstants,
        vars: &mut ControlVariables,
    ) -> Decision {
        use ControlState::*;
        let now = input.now;

        if input.door_open {
            self.event = Some(CycleEvent::Overridden);
            return Decision::Go(DoorOpen);
        }
        if self.state == DoorOpen {
            return Decision::Go(Idle);
        }
        if cs.mode == ControlMode::Off {
            self.timers.mark_idle(now);
            self.event = Some(CycleEvent::Overridden);
            return Decision::Go(Off);
        }

        let sensors_ok =
            input.fridge_connected && (input.beer_connected || !cs.mode.is_beer_mode());
        let setting = match cs.fridge_setting {
            Some(setting) if sensors_ok => setting,
            _ => {
                self.timers.mark_idle(now);
                self.event = Some(CycleEvent::Overridden);
                return Decision::Go(Idle);
            }
        };

        match self.state {
            Idle | Startup | Off | DoorOpen => {
                self.timers.mark_idle(now);
                self.decide_start(input, cs.mode, setting, cc)
            }
            Cooling => {
                self.timers.mark_cooling(now);
                let since_idle = self.timers.since_idle(now);
                let overshoot =
                    overshoot(cs.cool_estimator, cc.max_cool_time_for_estimate, since_idle);
                vars.estimated_peak = input.fridge_fast - overshoot;
                if vars.estimated_peak > setting {
                    return Decision::Go(Cooling);
                }
                let mut wait = WaitTime::default();
                wait.require(self.dwell.min_cool_on_time, since_idle);
                if wait.is_open() {
                    vars.neg_peak_estimate = vars.estimated_peak;
                    self.event = Some(CycleEvent::Completed(Cooling));
                    Decision::Go(Idle)
                } else {
                    Decision::Defer { wanted: Idle, wait }
                }
            }
            Heating => {
                self.timers.mark_heating(now);
                let since_idle = self.timers.since_idle(now);
                let overshoot =
                    overshoot(cs.heat_estimator, cc.max_heat_time_for_estimate, since_idle);
                vars.estimated_peak = input.fridge_fast + overshoot;
                if vars.estimated_peak < setting {
                    return Decision::Go(Heating);
                }
                let mut wait = WaitTime::default();
                wait.require(self.dwell.min_heat_on_time, since_idle);
                if wait.is_open() {
                    vars.pos_peak_estimate = vars.estimated_peak;
                    self.event = Some(CycleEvent::Completed(Heating));
                    Decision::Go(Idle)
                } else {
                    Decision::Defer { wanted: Idle, wait }
                }
            }
        }
    }

    fn decide_start(
        &self,
        input: &StateInputs,
        mode: ControlMode,
        setting: Temp,
        cc: &ControlConstants,
    ) -> Decision {
        let now = input.now;
        let since_cooling = self.timers.since_cooling(now);
        let since_heating = self.timers.since_heating(now);
        let mut wait = WaitTime::default();

        let wanted = if input.fridge_fast > setting + cc.idle_range_high {
            let cool_off = if mode == ControlMode::FridgeConstant {
                self.dwell.min_cool_off_time_fridge_constant
            } else {
                self.dwell.min_cool_off_time
            };
            wait.require(cool_off, since_cooling);
            wait.require(self.dwell.min_switch_time, since_heating);
            ControlState::Cooling
        } else if input.fridge_fast < setting + cc.idle_range_low {
            wait.require(self.dwell.min_heat_off_time, since_heating);
            wait.require(self.dwell.min_switch_time, since_cooling);
            ControlState::Heating
        } else {
            return Decision::Go(ControlState::Idle);
        };

        if wait.is_open() {
            Decision::Go(wanted)
        } else {
            Decision::Defer { wanted, wait }
        }
    }
}

/// Predicted overshoot: `estimator × min(limit, active) / 3600`. Estimators
/// are in degrees per hour of actuation.
fn overshoot(estimator: Temp, limit: u16, active: Seconds) -> Temp {
    let seconds = active.min(limit as Seconds) as i64;
    Temp::from_wide(((estimator.raw() as i64 * seconds) / SECONDS_PER_HOUR as i64) as i32)
}

// ─── Tests ──────────────────────────────────────────────────────────
