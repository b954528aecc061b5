//! Integration test: a full cooling cycle under the dwell gates.
//!
//! Validates: beer setpoint → PID fridge setpoint → Startup held by the
//! compressor off time → Cooling → minimum on time honoured after the beer
//! drops below setpoint → Idle → heating held by the switch time.

use brew_common::control::error::TickFlags;
use brew_common::control::settings::ControlConstants;
use brew_common::control::state::ControlState;
use brew_common::fixed::Temp;

use brew_control_unit::state::machine::StateOutcome;

use super::{Rig, beer_constant, fridge_constant};

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn warm_beer_cools_after_the_off_time() {
    let mut ctl = beer_constant(20.0);
    let mut rig = Rig::new(21.0, 20.0);

    let report = rig.tick(&mut ctl, 1);
    assert_eq!(report.state, ControlState::Startup);
    // 20 + 20 × (20 − 21), clamped to the setpoint range.
    assert_eq!(report.fridge_setting, Some(Temp::from_int(1)));
    match report.outcome {
        StateOutcome::Deferred { wanted, wait, .. } => {
            assert_eq!(wanted, ControlState::Cooling);
            // Switch time from boot is the longest gate.
            assert_eq!(wait, 599);
        }
        other => panic!("expected a deferred start, got {other:?}"),
    }

    for now in 2..600 {
        let report = rig.tick(&mut ctl, now);
        assert_eq!(report.state, ControlState::Startup, "t={now}");
        assert!(!rig.cooler.is_active());
    }

    let report = rig.tick(&mut ctl, 600);
    assert_eq!(report.state, ControlState::Cooling);
    assert!(report.flags.contains(TickFlags::STATE_CHANGED));
    assert!(rig.cooler.is_active());
    assert!(rig.fan.is_active());
    assert!(!rig.heater.is_active());
}

#[test]
fn cooling_runs_its_minimum_on_time() {
    let mut ctl = beer_constant(20.0);
    let mut rig = Rig::new(21.0, 20.0);
    for now in 1..=600 {
        rig.tick(&mut ctl, now);
    }
    assert_eq!(ctl.state(), ControlState::Cooling);

    // Beer now below setpoint: the PID wants a warm fridge straight away.
    rig.beer.set(19.0);
    for now in 601..900 {
        let report = rig.tick(&mut ctl, now);
        assert_eq!(report.state, ControlState::Cooling, "t={now}");
        assert!(rig.cooler.is_active(), "t={now}");
    }
    let report = rig.tick(&mut ctl, 900);
    assert_eq!(report.state, ControlState::Idle);
    assert!(!rig.cooler.is_active());
    assert!(!rig.fan.is_active());
    assert!(report.fridge_setting.unwrap() > Temp::from_int(21));
}

#[test]
fn stop_is_deferred_not_skipped() {
    let mut ctl = beer_constant(20.0);
    let mut rig = Rig::new(21.0, 20.0);
    for now in 1..=600 {
        rig.tick(&mut ctl, now);
    }
    rig.beer.set(19.0);
    let reports: Vec<_> = (601..900).map(|now| rig.tick(&mut ctl, now)).collect();
    assert!(
        reports
            .iter()
            .any(|r| r.flags.contains(TickFlags::TRANSITION_DEFERRED))
    );

    let last = reports.last().unwrap();
    assert_eq!(last.now, 899);
    assert_eq!(
        last.outcome,
        StateOutcome::Deferred {
            state: ControlState::Cooling,
            wanted: ControlState::Idle,
            wait: 1,
        }
    );
}

#[test]
fn heating_waits_for_the_switch_time_after_cooling() {
    let mut ctl = beer_constant(20.0);
    let mut rig = Rig::new(21.0, 20.0);
    for now in 1..=600 {
        rig.tick(&mut ctl, now);
    }
    rig.beer.set(19.0);
    for now in 601..=900 {
        rig.tick(&mut ctl, now);
    }
    assert_eq!(ctl.state(), ControlState::Idle);

    for now in 901..1500 {
        let report = rig.tick(&mut ctl, now);
        assert_eq!(report.state, ControlState::Idle, "t={now}");
        assert!(!rig.heater.is_active());
    }
    let report = rig.tick(&mut ctl, 1500);
    assert_eq!(report.state, ControlState::Heating);
    assert!(rig.heater.is_active());
    assert!(!rig.cooler.is_active());
}

#[test]
fn fridge_constant_uses_its_longer_off_time() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    for now in 1..900 {
        let report = rig.tick(&mut ctl, now);
        assert_eq!(report.state, ControlState::Startup, "t={now}");
    }
    assert_eq!(rig.tick(&mut ctl, 900).state, ControlState::Cooling);
}

#[test]
fn lost_beer_probe_holds_fridge_setpoint() {
    let mut ctl = beer_constant(20.0);
    let mut rig = Rig::new(20.25, 20.0);
    let held = rig.tick(&mut ctl, 1).fridge_setting;
    assert_eq!(held, Some(Temp::from_int(15)));

    rig.beer.0 = None;
    for now in 2..=700 {
        let report = rig.tick(&mut ctl, now);
        assert!(report.flags.contains(TickFlags::BEER_SENSOR_LOST));
        assert_eq!(report.fridge_setting, held);
        assert_eq!(report.beer, None);
        // Beer modes need both probes to act.
        assert_eq!(report.state, ControlState::Idle);
    }
    assert!(!rig.cooler.is_active());

    rig.beer.set(20.25);
    let report = rig.tick(&mut ctl, 701);
    assert_eq!(report.beer, Some(Temp::from_f64(20.25)));
    assert_eq!(report.state, ControlState::Cooling);
}

#[test]
fn warm_fridge_cools_and_holds_through_a_sudden_drop() {
    // Idle band [19.5, 20.5] around a 20.0 fridge setpoint.
    let constants = ControlConstants {
        idle_range_high: Temp::from_f64(0.5),
        idle_range_low: Temp::from_f64(-0.5),
        ..Default::default()
    };
    let mut ctl = fridge_constant(20.0, constants);
    let mut rig = Rig::new(20.0, 20.0);
    for now in 1..=100 {
        assert_eq!(rig.tick(&mut ctl, now).state, ControlState::Idle, "t={now}");
    }

    rig.fridge.set(21.0);
    for now in 101..899 {
        assert_eq!(rig.tick(&mut ctl, now).state, ControlState::Idle, "t={now}");
    }
    let report = rig.tick(&mut ctl, 899);
    assert_eq!(
        report.outcome,
        StateOutcome::Deferred {
            state: ControlState::Idle,
            wanted: ControlState::Cooling,
            wait: 1,
        }
    );

    // Gates open: cooling starts on this very tick.
    let report = rig.tick(&mut ctl, 900);
    assert_eq!(
        report.outcome,
        StateOutcome::Changed {
            from: ControlState::Idle,
            to: ControlState::Cooling,
        }
    );
    assert!(rig.cooler.is_active());
    for now in 901..950 {
        assert_eq!(rig.tick(&mut ctl, now).state, ControlState::Cooling, "t={now}");
    }

    // Fridge reads 19.0 mid-cycle; the minimum on time still holds.
    rig.fridge.set(19.0);
    for now in 950..1200 {
        let report = rig.tick(&mut ctl, now);
        assert_eq!(report.state, ControlState::Cooling, "t={now}");
        assert!(rig.cooler.is_active(), "t={now}");
    }
    let report = rig.tick(&mut ctl, 1200);
    assert_eq!(
        report.outcome,
        StateOutcome::Changed {
            from: ControlState::Cooling,
            to: ControlState::Idle,
        }
    );
    assert!(!rig.cooler.is_active());
}
