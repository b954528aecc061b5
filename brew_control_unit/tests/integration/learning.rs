//! Integration test: overshoot learning from scripted fridge curves.
//!
//! Validates: actuator stop records the predicted peak → the fridge keeps
//! moving past it → the slow-filter turning point is detected → the
//! estimator grows and is persisted. A curve with no turning point expires
//! the peak window instead. A cycle cut short by the door, or a door
//! opening inside the peak window, teaches nothing.

use brew_common::control::error::TickFlags;
use brew_common::control::settings::{ControlConstants, ControlSettings};
use brew_common::control::state::ControlState;
use brew_common::fixed::Temp;

use brew_control_unit::controller::{ControlLoop, TickReport};
use brew_control_unit::store::{MemoryStore, load_record};

use super::{Rig, fridge_constant};

/// Fridge ramp rate in °C per tick.
const RAMP: f64 = 0.01;

// ── Helpers ─────────────────────────────────────────────────────────

/// Scripted fridge curve: flat at `start` until `ramp_from`, then moving by
/// `RAMP × direction` per tick. `turn_after` ticks after the actuator stops
/// it turns back, or never when `None`.
struct Curve {
    start: f64,
    ramp_from: u32,
    direction: f64,
    turn_after: Option<u32>,
}

impl Curve {
    fn at(&self, now: u32, stopped_at: Option<u32>) -> f64 {
        if now <= self.ramp_from {
            return self.start;
        }
        let moving = |t: u32| self.start + self.direction * RAMP * (t - self.ramp_from) as f64;
        match (stopped_at, self.turn_after) {
            (Some(stop), Some(after)) if now > stop + after => {
                let apex = stop + after;
                moving(apex) - self.direction * RAMP * (now - apex) as f64
            }
            _ => moving(now),
        }
    }
}

/// Tick until `done` returns true or `limit` is reached. Returns the
/// stopping report and the tick on which the active state ended.
fn drive(
    rig: &mut Rig,
    ctl: &mut ControlLoop<MemoryStore>,
    curve: &Curve,
    active: ControlState,
    limit: u32,
    done: impl Fn(&TickReport) -> bool,
) -> (TickReport, u32) {
    let mut stopped_at = None;
    let mut was_active = false;
    for now in 1..=limit {
        rig.fridge.set(curve.at(now, stopped_at));
        let report = rig.tick(ctl, now);
        let is_active = report.state == active;
        if was_active && !is_active && stopped_at.is_none() {
            stopped_at = Some(now);
        }
        was_active = is_active;
        if done(&report) {
            return (report, stopped_at.unwrap_or(0));
        }
    }
    panic!("condition not reached within {limit} ticks");
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn cooling_overshoot_raises_cool_estimator() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    let curve = Curve {
        start: 10.0,
        ramp_from: 900,
        direction: -1.0,
        turn_after: Some(200),
    };
    let before = ctl.settings().cool_estimator;

    let (report, stopped_at) = drive(&mut rig, &mut ctl, &curve, ControlState::Cooling, 4000, |r| {
        r.flags.contains(TickFlags::NEG_PEAK_DETECTED)
    });

    // Cooling ran well past the minimum on time before stopping.
    assert!(stopped_at > 1200, "stopped at {stopped_at}");
    let delay = report.now - stopped_at;
    assert!((200..400).contains(&delay), "peak {delay} s after stop");
    assert_eq!(report.state, ControlState::Idle);

    let vars = ctl.variables();
    let error = vars.neg_peak - vars.neg_peak_estimate;
    assert!(error < Temp::from_f64(-0.3), "error {error}");

    assert!(report.flags.contains(TickFlags::ESTIMATOR_UPDATED));
    assert!(report.flags.contains(TickFlags::SETTINGS_PERSISTED));
    let after = ctl.settings().cool_estimator;
    assert!(after > before, "{before} -> {after}");
    // Growth is capped at ×1.5.
    assert!(after.raw() <= before.raw() * 3 / 2);

    let stored: ControlSettings = load_record(ctl.store()).unwrap();
    assert_eq!(stored.cool_estimator, after);
}

#[test]
fn heating_overshoot_raises_heat_estimator() {
    let mut ctl = fridge_constant(20.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    let curve = Curve {
        start: 10.0,
        ramp_from: 600,
        direction: 1.0,
        turn_after: Some(100),
    };
    let before = ctl.settings().heat_estimator;

    let (report, stopped_at) = drive(&mut rig, &mut ctl, &curve, ControlState::Heating, 4000, |r| {
        r.flags.contains(TickFlags::POS_PEAK_DETECTED)
    });

    assert!(stopped_at > 900, "stopped at {stopped_at}");
    assert!(report.now - stopped_at < 600);
    let vars = ctl.variables();
    assert!(vars.pos_peak - vars.pos_peak_estimate > Temp::from_f64(0.3));
    assert!(report.flags.contains(TickFlags::ESTIMATOR_UPDATED));
    assert!(ctl.settings().heat_estimator > before);
    // The cooling side is untouched.
    assert_eq!(
        ctl.settings().cool_estimator,
        ControlSettings::default().cool_estimator
    );
}

#[test]
fn peak_window_expires_without_a_turning_point() {
    // Wide idle band so the falling fridge never asks for heat.
    let constants = ControlConstants {
        idle_range_low: Temp::from_int(-20),
        ..Default::default()
    };
    let mut ctl = fridge_constant(4.0, constants);
    let mut rig = Rig::new(20.0, 10.0);
    let curve = Curve {
        start: 10.0,
        ramp_from: 900,
        direction: -1.0,
        turn_after: None,
    };
    let before = ctl.settings().cool_estimator;

    let (report, stopped_at) = drive(&mut rig, &mut ctl, &curve, ControlState::Cooling, 4000, |r| {
        r.flags.contains(TickFlags::PEAK_WINDOW_EXPIRED)
    });

    let window = u32::from(ctl.constants().max_cool_time_for_estimate);
    assert_eq!(report.now - stopped_at, window + 1);
    assert!(!report.flags.contains(TickFlags::NEG_PEAK_DETECTED));
    assert!(!report.flags.contains(TickFlags::ESTIMATOR_UPDATED));
    assert_eq!(ctl.settings().cool_estimator, before);
}

#[test]
fn setpoint_change_disarms_peak_detection() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    let curve = Curve {
        start: 10.0,
        ramp_from: 900,
        direction: -1.0,
        turn_after: Some(200),
    };

    // Run until cooling stops, then move the setpoint.
    let (_, stopped_at) = drive(&mut rig, &mut ctl, &curve, ControlState::Cooling, 4000, |r| {
        r.state == ControlState::Idle && r.now > 900
    });
    ctl.set_fridge_setting(Temp::from_int(5)).unwrap();

    for now in stopped_at + 1..stopped_at + 1500 {
        rig.fridge.set(curve.at(now, Some(stopped_at)));
        let report = rig.tick(&mut ctl, now);
        assert!(
            !report.flags.intersects(
                TickFlags::NEG_PEAK_DETECTED | TickFlags::PEAK_WINDOW_EXPIRED
            ),
            "t={now} flags={:?}",
            report.flags
        );
        if report.state == ControlState::Cooling {
            break;
        }
    }
}

#[test]
fn interrupted_cooling_is_not_learned() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    let before = ctl.settings().cool_estimator;

    // Cooling pulls the fridge down for 31 s, then the door opens and the
    // air warms back up: a slow-filter minimum with no finished cycle.
    let fridge = |now: u32| match now {
        ..=900 => 10.0,
        901..=931 => 10.0 - RAMP * (now - 900) as f64,
        _ => 10.0 - RAMP * 31.0 + RAMP * (now - 931) as f64,
    };
    for now in 1..=1500 {
        rig.fridge.set(fridge(now));
        rig.door.0 = (931..=1060).contains(&now);
        let report = rig.tick(&mut ctl, now);
        match now {
            900 => assert_eq!(report.state, ControlState::Cooling),
            931 => assert_eq!(report.state, ControlState::DoorOpen),
            1061.. => assert_eq!(report.state, ControlState::Idle, "t={now}"),
            _ => {}
        }
        assert!(
            !report.flags.intersects(
                TickFlags::NEG_PEAK_DETECTED
                    | TickFlags::ESTIMATOR_UPDATED
                    | TickFlags::PEAK_WINDOW_EXPIRED
            ),
            "t={now} flags={:?}",
            report.flags
        );
    }
    assert_eq!(ctl.settings().cool_estimator, before);
}

#[test]
fn door_during_peak_window_discards_the_peak() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    let curve = Curve {
        start: 10.0,
        ramp_from: 900,
        direction: -1.0,
        turn_after: Some(200),
    };
    let before = ctl.settings().cool_estimator;

    // Same curve as the learning case, but the door opens after the stop
    // and before the fridge turns back.
    let (_, stopped_at) = drive(&mut rig, &mut ctl, &curve, ControlState::Cooling, 4000, |r| {
        r.state == ControlState::Idle && r.now > 900
    });
    for now in stopped_at + 1..stopped_at + 800 {
        rig.fridge.set(curve.at(now, Some(stopped_at)));
        rig.door.0 = (stopped_at + 50..stopped_at + 110).contains(&now);
        let report = rig.tick(&mut ctl, now);
        assert_ne!(report.state, ControlState::Cooling, "t={now}");
        assert!(
            !report.flags.intersects(
                TickFlags::NEG_PEAK_DETECTED | TickFlags::PEAK_WINDOW_EXPIRED
            ),
            "t={now} flags={:?}",
            report.flags
        );
    }
    assert_eq!(ctl.settings().cool_estimator, before);
}
