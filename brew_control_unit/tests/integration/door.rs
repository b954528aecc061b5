//! Integration test: door handling against the simulated chamber.
//!
//! Validates: scheduled door opening preempts cooling → light on, cooler
//! and fan off → release lands in Idle → the compressor off time counts
//! from the interrupted cycle.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use brew_common::control::error::TickFlags;
use brew_common::control::settings::ControlConstants;
use brew_common::control::state::{ControlMode, ControlState};

use brew_control_unit::cycle::{CycleRunner, RunOptions};
use brew_control_unit::sim::{Chamber, DoorWindow, SimulationConfig};

use super::{Rig, fridge_constant, run_chamber};

// ── Helpers ─────────────────────────────────────────────────────────

fn chamber_with_door(open_at: u32, close_at: u32) -> Chamber {
    Chamber::new(SimulationConfig {
        door_schedule: vec![DoorWindow { open_at, close_at }],
        ..Default::default()
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn door_interrupts_cooling() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut chamber = chamber_with_door(1000, 1060);

    let reports = run_chamber(&mut ctl, &mut chamber, 1, 999);
    assert_eq!(reports[898].state, ControlState::Startup);
    assert_eq!(reports[899].state, ControlState::Cooling);
    assert_eq!(reports[998].state, ControlState::Cooling);
    assert!(chamber.cooler_on());
    assert!(!chamber.light_on());

    let reports = run_chamber(&mut ctl, &mut chamber, 1000, 1059);
    for r in &reports {
        assert_eq!(r.state, ControlState::DoorOpen, "t={}", r.now);
        assert!(r.flags.contains(TickFlags::DOOR_OPEN));
    }
    assert!(reports[0].flags.contains(TickFlags::STATE_CHANGED));
    assert!(!chamber.cooler_on());
    assert!(!chamber.fan_on());
    assert!(chamber.light_on());

    let reports = run_chamber(&mut ctl, &mut chamber, 1060, 1060);
    assert_eq!(reports[0].state, ControlState::Idle);
    assert!(!reports[0].flags.contains(TickFlags::DOOR_OPEN));
    assert!(!chamber.light_on());
}

#[test]
fn off_time_counts_from_the_interrupted_cycle() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut chamber = chamber_with_door(1000, 1060);
    run_chamber(&mut ctl, &mut chamber, 1, 1060);
    assert_eq!(ctl.state(), ControlState::Idle);
    assert!(chamber.fridge() > 10.0, "fridge {}", chamber.fridge());

    // Last cooling tick was 999; fridge-constant off time is 900 s.
    let reports = run_chamber(&mut ctl, &mut chamber, 1061, 1898);
    assert!(reports.iter().all(|r| r.state == ControlState::Idle));
    assert!(!chamber.cooler_on());

    let reports = run_chamber(&mut ctl, &mut chamber, 1899, 1899);
    assert_eq!(reports[0].state, ControlState::Cooling);
    assert!(chamber.cooler_on());
}

#[test]
fn door_preempts_startup_and_off() {
    let mut ctl = fridge_constant(4.0, ControlConstants::default());
    let mut rig = Rig::new(20.0, 10.0);
    rig.tick(&mut ctl, 1);
    assert_eq!(ctl.state(), ControlState::Startup);

    rig.door.0 = true;
    assert_eq!(rig.tick(&mut ctl, 2).state, ControlState::DoorOpen);
    assert!(rig.light.is_active());
    rig.door.0 = false;
    assert_eq!(rig.tick(&mut ctl, 3).state, ControlState::Idle);

    ctl.set_mode(ControlMode::Off);
    assert_eq!(rig.tick(&mut ctl, 4).state, ControlState::Off);
    rig.door.0 = true;
    let report = rig.tick(&mut ctl, 5);
    assert_eq!(report.state, ControlState::DoorOpen);
    assert!(rig.light.is_active());
    assert!(!rig.cooler.is_active());

    rig.door.0 = false;
    assert_eq!(rig.tick(&mut ctl, 6).state, ControlState::Idle);
    assert_eq!(rig.tick(&mut ctl, 7).state, ControlState::Off);
}

#[test]
fn runner_follows_the_door_schedule() {
    let ctl = fridge_constant(4.0, ControlConstants::default());
    let mut runner = CycleRunner::new(
        ctl,
        chamber_with_door(30, 40),
        Arc::new(AtomicBool::new(true)),
        RunOptions {
            fast: true,
            max_ticks: Some(35),
        },
    );
    runner.run().unwrap();
    assert_eq!(runner.now(), 35);
    assert_eq!(runner.stats.cycle_count, 35);
    assert_eq!(runner.controller.state(), ControlState::DoorOpen);
    assert!(runner.chamber.light_on());

    for _ in 36..=40 {
        runner.step();
    }
    assert_eq!(runner.controller.state(), ControlState::Idle);
    assert!(!runner.chamber.light_on());
}
