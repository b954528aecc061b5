//! Integration test: settings survive a restart.
//!
//! Validates: blank image file → defaults written → host writes persisted
//! → reboot from the same file restores mode, setpoints and estimators.
//! Corrupt or foreign images fall back to defaults.

use brew_common::consts::STORE_SIZE;
use brew_common::control::error::TickFlags;
use brew_common::control::settings::{ControlConstants, ControlSettings};
use brew_common::control::state::{ControlMode, ControlState};
use brew_common::control::timing::DwellTimes;
use brew_common::fixed::Temp;

use brew_control_unit::controller::ControlLoop;
use brew_control_unit::store::{
    BootSource, FileStore, MemoryStore, load_or_init, load_record, store_record,
};

use super::Rig;

// ── Helpers ─────────────────────────────────────────────────────────

fn boot(path: &std::path::Path) -> ControlLoop<FileStore> {
    ControlLoop::boot(
        FileStore::open(path),
        ControlConstants::default(),
        DwellTimes::default(),
        0,
    )
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn first_boot_writes_a_full_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");

    let ctl = boot(&path);
    assert_eq!(ctl.mode(), ControlMode::Off);
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), STORE_SIZE);
    assert_ne!(bytes[0], 0xFF);
}

#[test]
fn reboot_restores_host_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");

    {
        let mut ctl = boot(&path);
        ctl.set_mode_code(b'f').unwrap();
        ctl.set_fridge_setting(Temp::from_f64(6.5)).unwrap();
    }

    let ctl = boot(&path);
    assert_eq!(ctl.mode(), ControlMode::FridgeConstant);
    assert_eq!(ctl.fridge_setting(), Some(Temp::from_f64(6.5)));
    assert_eq!(ctl.beer_setting(), None);
    // A reboot starts over in Startup regardless of the stored mode.
    assert_eq!(ctl.state(), ControlState::Startup);
}

#[test]
fn custom_constants_survive_and_win_over_file_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");

    {
        let mut ctl = boot(&path);
        let mut constants = ControlConstants::default();
        constants.kp = Temp::from_int(10);
        constants.light_as_heater = true;
        ctl.set_constants(constants).unwrap();
    }

    let ctl = boot(&path);
    assert_eq!(ctl.constants().kp, Temp::from_int(10));
    assert!(ctl.constants().light_as_heater);
}

#[test]
fn beer_profile_writes_only_large_steps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");

    {
        let mut ctl = boot(&path);
        ctl.set_mode(ControlMode::BeerProfile);
        ctl.set_beer_setting(Temp::from_f64(18.0)).unwrap();
        // A profile ramp in 0.1 °C steps.
        for step in 1..=2 {
            ctl.set_beer_setting(Temp::from_f64(18.0 + 0.1 * step as f64))
                .unwrap();
        }
        assert_eq!(ctl.beer_setting(), Some(Temp::from_f64(18.2)));
    }
    let ctl = boot(&path);
    assert_eq!(ctl.mode(), ControlMode::BeerProfile);
    assert_eq!(ctl.beer_setting(), Some(Temp::from_f64(18.0)));

    {
        let mut ctl = ctl;
        ctl.set_beer_setting(Temp::from_f64(18.3)).unwrap();
    }
    let ctl = boot(&path);
    assert_eq!(ctl.beer_setting(), Some(Temp::from_f64(18.3)));
}

#[test]
fn steady_ticks_do_not_rewrite_the_store() {
    let mut store = MemoryStore::new();
    let mut ctl = ControlLoop::boot(
        &mut store,
        ControlConstants::default(),
        DwellTimes::default(),
        0,
    );
    ctl.set_mode_code(b'f').unwrap();
    ctl.set_fridge_setting(Temp::from_int(4)).unwrap();
    let mut rig = Rig::new(20.0, 10.0);
    for now in 1..=100 {
        let report = rig.tick(&mut ctl, now);
        assert!(
            !report.flags.contains(TickFlags::SETTINGS_PERSISTED),
            "t={now}"
        );
    }
    drop(ctl);

    let stored: ControlSettings = load_record(&store).unwrap();
    assert_eq!(stored.mode, ControlMode::FridgeConstant);
    assert_eq!(stored.fridge_setting, Some(Temp::from_int(4)));
}

#[test]
fn corrupt_image_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");

    let mut store = MemoryStore::new();
    let settings = ControlSettings {
        mode: ControlMode::BeerConstant,
        ..Default::default()
    };
    load_or_init(&mut store, settings, ControlConstants::default());
    // Invalid constants: setting range inverted.
    let bad = ControlConstants {
        temp_setting_min: Temp::from_int(30),
        temp_setting_max: Temp::from_int(1),
        ..Default::default()
    };
    store_record(&mut store, &bad);
    std::fs::write(&path, store.as_bytes()).unwrap();

    let mut file = FileStore::open(&path);
    let records = load_or_init(&mut file, ControlSettings::default(), ControlConstants::default());
    assert_eq!(records.source, BootSource::Defaults);
    assert_eq!(records.settings.mode, ControlMode::Off);

    let reopened = FileStore::open(&path);
    let stored: ControlConstants = load_record(&reopened).unwrap();
    assert_eq!(stored, ControlConstants::default());
}

#[test]
fn short_file_reads_as_blank_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chamber.eeprom");
    std::fs::write(&path, [0u8; 4]).unwrap();

    let ctl = boot(&path);
    assert_eq!(ctl.mode(), ControlMode::Off);
    assert_eq!(std::fs::read(&path).unwrap().len(), STORE_SIZE);
}
