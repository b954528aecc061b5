//! Workspace-wide constants.
//!
//! Single source of truth for timing defaults, filter limits and the
//! durable-store layout size.

/// Control tick period in milliseconds.
pub const TICK_PERIOD_MS: u64 = 1000;

// ─── Dwell-time defaults [s] ────────────────────────────────────────

/// Minimum compressor off time between cooling cycles.
pub const MIN_COOL_OFF_TIME: u32 = 300;
/// Minimum heater off time, so heat is applied in cycles.
pub const MIN_HEAT_OFF_TIME: u32 = 300;
/// Minimum compressor on time once started.
pub const MIN_COOL_ON_TIME: u32 = 300;
/// Minimum heater on time once started.
pub const MIN_HEAT_ON_TIME: u32 = 300;
/// Minimum compressor off time in fridge-constant mode.
pub const MIN_COOL_OFF_TIME_FRIDGE_CONSTANT: u32 = 900;
/// Minimum idle time when switching between heating and cooling.
pub const MIN_SWITCH_TIME: u32 = 600;

// ─── Control loop ───────────────────────────────────────────────────

/// Ticks between PID integrator updates.
pub const INTEGRAL_UPDATE_INTERVAL: u8 = 60;

/// Ticks between slope filter updates.
pub const SLOPE_UPDATE_INTERVAL: u8 = 3;

/// Multiplier turning a 3 s difference into a per-hour slope.
pub const SLOPE_PER_HOUR_SCALE: i32 = 1200;

/// Largest 3 s difference [°C] fed to the slope filter (i32::MAX / 1200 / 2^16).
pub const SLOPE_DIFF_LIMIT: i32 = 27;

/// Seconds per hour, estimators are expressed as overshoot per hour of actuation.
pub const SECONDS_PER_HOUR: i32 = 3600;

/// Largest accepted filter `b` selector. The derived `a = 2b + 4` must stay
/// a valid shift for a 32-bit accumulator.
pub const MAX_FILTER_B: u8 = 12;

/// Estimators never drop below 0.05 (raw 7.9).
pub const ESTIMATOR_FLOOR_RAW: i16 = 25;

// ─── Durable store ──────────────────────────────────────────────────

/// Size of the settings store image in bytes (EEPROM-sized).
pub const STORE_SIZE: usize = 1024;

/// Format marker written at offset 0 once the store holds valid records.
/// Bump when a record layout changes.
pub const STORE_FORMAT_VERSION: u8 = 1;
