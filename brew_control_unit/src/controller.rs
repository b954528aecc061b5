//! Chamber control loop.
//!
//! One owned [`ControlLoop`] holds every mutable control record. Each tick
//! runs, in order:
//!
//! 1. sensor and door reads, fast/slow/slope filters
//! 2. peak detection on the fridge slow filter, estimator learning
//! 3. PID placement of the fridge setpoint (beer modes)
//! 4. state machine update
//! 5. actuator outputs (skipped in Test mode)
//! 6. settings persistence when something meaningful changed
//!
//! Nothing here fails. Per-tick conditions come back as [`TickFlags`] in the
//! [`TickReport`]; rejected host writes return [`SettingError`].

use brew_common::config::ConfigError;
use brew_common::consts::INTEGRAL_UPDATE_INTERVAL;
use brew_common::control::error::{SettingError, TickFlags};
use brew_common::control::settings::{ControlConstants, ControlSettings, ControlVariables};
use brew_common::control::state::{ControlMode, ControlState};
use brew_common::control::timing::DwellTimes;
use brew_common::fixed::Temp;
use tracing::{debug, info, trace, warn};

use crate::control::estimator::{Adjustment, PeakKind, learn};
use crate::control::pid::{IntegratorContext, pid_compute, update_integral};
use crate::control::sensor::TempSensor;
use crate::io::ChamberIo;
use crate::state::machine::{CycleEvent, StateInputs, StateOutcome, TempStateMachine};
use crate::state::timers::Seconds;
use crate::store::{SettingsStore, load_or_init, store_record};

/// Beer setpoint changes smaller than this (0.25 °C) keep peak detection
/// armed and, in profile mode, are not written to the store.
const SETTING_CHANGE_THRESHOLD: i16 = 128;

/// Summary of one tick, for logging and the host link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub now: Seconds,
    pub state: ControlState,
    pub outcome: StateOutcome,
    pub flags: TickFlags,
    /// Fast-filtered beer temperature, `None` while the probe is lost.
    pub beer: Option<Temp>,
    /// Fast-filtered fridge temperature, `None` while the probe is lost.
    pub fridge: Option<Temp>,
    pub beer_setting: Option<Temp>,
    pub fridge_setting: Option<Temp>,
}

/// Fermentation chamber controller.
pub struct ControlLoop<S: SettingsStore> {
    settings: ControlSettings,
    constants: ControlConstants,
    vars: ControlVariables,
    beer: TempSensor,
    fridge: TempSensor,
    machine: TempStateMachine,
    pos_peak_armed: bool,
    neg_peak_armed: bool,
    integral_countdown: u8,
    door_open: bool,
    now: Seconds,
    store: S,
    /// Settings as last written to the store.
    persisted: ControlSettings,
}

impl<S: SettingsStore> ControlLoop<S> {
    /// Controller with explicit records. `settings` is taken as already
    /// persisted.
    pub fn new(
        store: S,
        settings: ControlSettings,
        constants: ControlConstants,
        dwell: DwellTimes,
        boot: Seconds,
    ) -> Self {
        let f = constants.filters;
        let mut settings = settings;
        if settings.mode == ControlMode::FridgeConstant {
            settings.beer_setting = None;
        }
        Self {
            settings,
            constants,
            vars: ControlVariables::default(),
            beer: TempSensor::new("beer", f.beer_fast, f.beer_slow, f.beer_slope),
            fridge: TempSensor::new("fridge", f.fridge_fast, f.fridge_slow, f.fridge_slope),
            machine: TempStateMachine::new(dwell, boot),
            pos_peak_armed: false,
            neg_peak_armed: false,
            integral_countdown: INTEGRAL_UPDATE_INTERVAL,
            door_open: false,
            now: boot,
            store,
            persisted: settings,
        }
    }

    /// Controller restored from `store`, or initialised with defaults and
    /// `file_constants` if the store holds no valid image.
    pub fn boot(
        mut store: S,
        file_constants: ControlConstants,
        dwell: DwellTimes,
        boot: Seconds,
    ) -> Self {
        let records = load_or_init(&mut store, ControlSettings::default(), file_constants);
        info!(
            mode = %records.settings.mode,
            source = ?records.source,
            beer_setting = ?records.settings.beer_setting,
            fridge_setting = ?records.settings.fridge_setting,
            "controller booted"
        );
        Self::new(store, records.settings, records.constants, dwell, boot)
    }

    // ─── Tick ───────────────────────────────────────────────────────

    /// Run one control tick at monotonic time `now`.
    pub fn tick(&mut self, now: Seconds, io: &mut ChamberIo<'_>) -> TickReport {
        self.now = now;
        let mut flags = TickFlags::empty();

        if !self.beer.update(io.beer.read()) {
            flags |= TickFlags::BEER_SENSOR_LOST;
        }
        if !self.fridge.update(io.fridge.read()) {
            flags |= TickFlags::FRIDGE_SENSOR_LOST;
        }
        self.door_open = io.door.is_open();
        if self.door_open {
            flags |= TickFlags::DOOR_OPEN;
        }

        self.detect_peaks(&mut flags);
        self.update_pid(true);
        let outcome = self.update_state(&mut flags);

        if self.settings.mode != ControlMode::Test {
            self.update_outputs(io);
        }
        if self.persist_if_changed() {
            flags |= TickFlags::SETTINGS_PERSISTED;
        }

        trace!(
            now,
            state = %outcome.state(),
            beer = %self.beer.read_fast(),
            fridge = %self.fridge.read_fast(),
            flags = ?flags,
            "tick"
        );

        TickReport {
            now,
            state: outcome.state(),
            outcome,
            flags,
            beer: self.beer_temp(),
            fridge: self.fridge_temp(),
            beer_setting: self.settings.beer_setting,
            fridge_setting: self.settings.fridge_setting,
        }
    }

    fn detect_peaks(&mut self, flags: &mut TickFlags) {
        if !self.fridge.is_connected() {
            return;
        }
        let state = self.machine.state();
        let timers = *self.machine.timers();
        let now = self.now;

        if self.pos_peak_armed && state != ControlState::Heating {
            if let Some(peak) = self.fridge.detect_pos_peak() {
                self.pos_peak_armed = false;
                self.vars.pos_peak = peak;
                *flags |= TickFlags::POS_PEAK_DETECTED;
                let error = peak - self.vars.pos_peak_estimate;
                info!(peak = %peak, estimate = %self.vars.pos_peak_estimate, "fridge maximum after heating");
                if let Some(v) = self.apply_learning(PeakKind::Positive, self.settings.heat_estimator, error) {
                    self.settings.heat_estimator = v;
                    *flags |= TickFlags::ESTIMATOR_UPDATED;
                }
            } else if timers.since_heating(now) > u32::from(self.constants.max_heat_time_for_estimate) {
                self.pos_peak_armed = false;
                *flags |= TickFlags::PEAK_WINDOW_EXPIRED;
                debug!("no heating peak inside the estimate window");
            }
        }

        if self.neg_peak_armed && state != ControlState::Cooling {
            if let Some(peak) = self.fridge.detect_neg_peak() {
                self.neg_peak_armed = false;
                self.vars.neg_peak = peak;
                *flags |= TickFlags::NEG_PEAK_DETECTED;
                let error = peak - self.vars.neg_peak_estimate;
                info!(peak = %peak, estimate = %self.vars.neg_peak_estimate, "fridge minimum after cooling");
                if let Some(v) = self.apply_learning(PeakKind::Negative, self.settings.cool_estimator, error) {
                    self.settings.cool_estimator = v;
                    *flags |= TickFlags::ESTIMATOR_UPDATED;
                }
            } else if timers.since_cooling(now) > u32::from(self.constants.max_cool_time_for_estimate) {
                self.neg_peak_armed = false;
                *flags |= TickFlags::PEAK_WINDOW_EXPIRED;
                debug!("no cooling peak inside the estimate window");
            }
        }
    }

    fn apply_learning(&self, kind: PeakKind, estimator: Temp, error: Temp) -> Option<Temp> {
        match learn(kind, estimator, error, &self.constants) {
            Adjustment::Increased(v) => {
                info!(kind = ?kind, error = %error, from = %estimator, to = %v, "estimator increased");
                Some(v)
            }
            Adjustment::Decreased(v) => {
                info!(kind = ?kind, error = %error, from = %estimator, to = %v, "estimator decreased");
                Some(v)
            }
            Adjustment::Kept => {
                debug!(kind = ?kind, error = %error, "peak inside target band");
                None
            }
        }
    }

    /// Place the fridge setpoint from the beer error. `integrate` advances
    /// the integral countdown; host writes refresh the output without it.
    fn update_pid(&mut self, integrate: bool) {
        let mode = self.settings.mode;
        if mode == ControlMode::FridgeConstant {
            self.settings.beer_setting = None;
            return;
        }
        if !mode.is_beer_mode() {
            return;
        }
        let Some(beer_setting) = self.settings.beer_setting else {
            return;
        };
        if !self.beer.is_connected() {
            // Hold the last fridge setpoint on stale beer data.
            return;
        }

        let beer_slow = self.beer.read_slow();
        if integrate {
            self.integral_countdown = self.integral_countdown.saturating_sub(1);
            if self.integral_countdown == 0 {
                self.integral_countdown = INTEGRAL_UPDATE_INTERVAL;
                self.vars.beer_diff = beer_setting - beer_slow;
                let ctx = IntegratorContext {
                    idle: self.machine.state() == ControlState::Idle,
                    fridge_setting: self.settings.fridge_setting,
                    fridge_fast: self.fridge.read_fast(),
                };
                update_integral(&mut self.vars, &self.constants, ctx);
            }
        }

        let fridge_setting = pid_compute(
            &mut self.vars,
            &self.constants,
            beer_setting,
            beer_slow,
            self.beer.read_slope(),
        );
        self.settings.fridge_setting = Some(fridge_setting);
    }

    fn update_state(&mut self, flags: &mut TickFlags) -> StateOutcome {
        let before = self.machine.state();
        let input = StateInputs {
            now: self.now,
            door_open: self.door_open,
            fridge_connected: self.fridge.is_connected(),
            beer_connected: self.beer.is_connected(),
            fridge_fast: self.fridge.read_fast(),
        };
        let outcome = self
            .machine
            .update(&input, &self.settings, &self.constants, &mut self.vars);

        let after = outcome.state();
        if after != before {
            *flags |= TickFlags::STATE_CHANGED;
            info!(
                from = %before,
                to = %after,
                fridge = %input.fridge_fast,
                setting = ?self.settings.fridge_setting,
                "state changed"
            );
        }
        if let StateOutcome::Deferred { wanted, wait, .. } = outcome {
            *flags |= TickFlags::TRANSITION_DEFERRED;
            trace!(state = %after, wanted = %wanted, wait, "transition deferred");
        }

        // Only a cycle that ran to its predicted peak has a baseline to
        // learn against.
        match self.machine.cycle_event() {
            Some(CycleEvent::Completed(ControlState::Heating)) => self.pos_peak_armed = true,
            Some(CycleEvent::Completed(ControlState::Cooling)) => self.neg_peak_armed = true,
            Some(CycleEvent::Overridden) if self.pos_peak_armed || self.neg_peak_armed => {
                debug!(state = %after, "peak detection disarmed");
                self.reset_peak_detection();
            }
            _ => {}
        }
        outcome
    }

    fn update_outputs(&self, io: &mut ChamberIo<'_>) {
        let state = self.machine.state();
        let light_as_heater = self.constants.light_as_heater;
        let heating = state == ControlState::Heating;

        io.cooler.set_active(state == ControlState::Cooling);
        io.heater.set_active(heating && !light_as_heater);
        if let Some(light) = io.light.as_mut() {
            light.set_active(self.door_open || (light_as_heater && heating));
        }
        if let Some(fan) = io.fan.as_mut() {
            fan.set_active(state.is_active());
        }
    }

    fn persist_if_changed(&mut self) -> bool {
        let s = &self.settings;
        let p = &self.persisted;
        let beer_changed = match (s.beer_setting, p.beer_setting) {
            (Some(now), Some(stored)) if s.mode == ControlMode::BeerProfile => {
                (now.raw() as i32 - stored.raw() as i32).abs() > SETTING_CHANGE_THRESHOLD as i32
            }
            (now, stored) => now != stored,
        };
        let changed = s.mode != p.mode
            || beer_changed
            || s.heat_estimator != p.heat_estimator
            || s.cool_estimator != p.cool_estimator
            || (s.mode == ControlMode::FridgeConstant && s.fridge_setting != p.fridge_setting);
        if !changed {
            return false;
        }
        store_record(&mut self.store, &self.settings);
        self.persisted = self.settings;
        debug!(mode = %self.settings.mode, "settings persisted");
        true
    }

    fn reset_peak_detection(&mut self) {
        self.pos_peak_armed = false;
        self.neg_peak_armed = false;
    }

    // ─── Host API ───────────────────────────────────────────────────

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.settings.mode
    }

    /// Switch mode. Any change drops to Idle (Off for Off mode) so the
    /// next tick decides from scratch. A beer mode entered without a beer
    /// setpoint also drops the fridge setpoint, leaving the chamber idle
    /// until one is set.
    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode == self.settings.mode {
            return;
        }
        info!(from = %self.settings.mode, to = %mode, "mode changed");
        self.settings.mode = mode;
        match mode {
            ControlMode::Off | ControlMode::BeerProfile => {
                self.settings.beer_setting = None;
                self.settings.fridge_setting = None;
            }
            ControlMode::FridgeConstant => self.settings.beer_setting = None,
            ControlMode::BeerConstant => {
                if self.settings.beer_setting.is_none() {
                    self.settings.fridge_setting = None;
                }
            }
            ControlMode::Test => {}
        }
        self.reset_peak_detection();
        let forced = if mode == ControlMode::Off {
            ControlState::Off
        } else {
            ControlState::Idle
        };
        self.machine.force(forced, self.now);
        self.persist_if_changed();
    }

    /// Set the mode from its single-character host code.
    pub fn set_mode_code(&mut self, code: u8) -> Result<(), SettingError> {
        let Some(mode) = ControlMode::from_code(code) else {
            warn!(code, "unknown mode code rejected");
            return Err(SettingError::UnknownMode(code));
        };
        self.set_mode(mode);
        Ok(())
    }

    #[inline]
    pub fn beer_setting(&self) -> Option<Temp> {
        self.settings.beer_setting
    }

    /// Set the beer setpoint. Rejected in fridge-constant mode or outside
    /// the configured setpoint limits.
    pub fn set_beer_setting(&mut self, value: Temp) -> Result<(), SettingError> {
        let mode = self.settings.mode;
        if mode == ControlMode::FridgeConstant {
            warn!(value = %value, mode = %mode, "beer setpoint rejected");
            return Err(SettingError::NotApplicable { mode });
        }
        let value = self.constants.check_setpoint(value).inspect_err(|e| {
            warn!(error = %e, "beer setpoint rejected");
        })?;

        let previous = self.settings.beer_setting;
        self.settings.beer_setting = Some(value);
        let large_step = previous.is_none_or(|prev| {
            (value.raw() as i32 - prev.raw() as i32).abs() > SETTING_CHANGE_THRESHOLD as i32
        });
        if large_step {
            self.reset_peak_detection();
        }
        debug!(value = %value, "beer setpoint set");
        self.update_pid(false);
        self.persist_if_changed();
        Ok(())
    }

    #[inline]
    pub fn fridge_setting(&self) -> Option<Temp> {
        self.settings.fridge_setting
    }

    /// Set the fridge setpoint directly. Rejected in beer modes, where the
    /// PID owns it.
    pub fn set_fridge_setting(&mut self, value: Temp) -> Result<(), SettingError> {
        let mode = self.settings.mode;
        if mode.is_beer_mode() {
            warn!(value = %value, mode = %mode, "fridge setpoint rejected");
            return Err(SettingError::NotApplicable { mode });
        }
        let value = self.constants.check_setpoint(value).inspect_err(|e| {
            warn!(error = %e, "fridge setpoint rejected");
        })?;
        self.settings.fridge_setting = Some(value);
        self.reset_peak_detection();
        debug!(value = %value, "fridge setpoint set");
        self.persist_if_changed();
        Ok(())
    }

    /// Beer temperature, `None` while the probe is lost.
    pub fn beer_temp(&self) -> Option<Temp> {
        self.beer.is_connected().then(|| self.beer.read_fast())
    }

    /// Fridge temperature, `None` while the probe is lost.
    pub fn fridge_temp(&self) -> Option<Temp> {
        self.fridge.is_connected().then(|| self.fridge.read_fast())
    }

    #[inline]
    pub fn state(&self) -> ControlState {
        self.machine.state()
    }

    /// Seconds since the last state change, as of the last tick.
    #[inline]
    pub fn time_in_state(&self) -> Seconds {
        self.machine.time_in_state(self.now)
    }

    #[inline]
    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    #[inline]
    pub fn constants(&self) -> &ControlConstants {
        &self.constants
    }

    #[inline]
    pub fn variables(&self) -> &ControlVariables {
        &self.vars
    }

    #[inline]
    pub fn dwell(&self) -> &DwellTimes {
        self.machine.dwell()
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the constants. Validated first; filter selectors apply to
    /// the next sample and the record is written through to the store.
    pub fn set_constants(&mut self, constants: ControlConstants) -> Result<(), ConfigError> {
        constants.validate()?;
        let f = constants.filters;
        self.beer
            .set_filter_coefficients(f.beer_fast, f.beer_slow, f.beer_slope);
        self.fridge
            .set_filter_coefficients(f.fridge_fast, f.fridge_slow, f.fridge_slope);
        self.constants = constants;
        store_record(&mut self.store, &self.constants);
        info!("control constants updated");
        Ok(())
    }

    /// Back to Startup with fresh filters and working variables. Dwell
    /// timers are kept, so a restart still protects the compressor.
    pub fn reset(&mut self) {
        self.vars = ControlVariables::default();
        self.beer.reset();
        self.fridge.reset();
        self.reset_peak_detection();
        self.integral_countdown = INTEGRAL_UPDATE_INTERVAL;
        self.machine.force(ControlState::Startup, self.now);
        info!("controller reset");
    }
}

impl<S: SettingsStore> core::fmt::Debug for ControlLoop<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("state", &self.machine.state())
            .field("settings", &self.settings)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
