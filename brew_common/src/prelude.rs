//! Prelude module for common re-exports.
//!
//! ```rust
//! use brew_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Fixed point ────────────────────────────────────────────────────
pub use crate::fixed::{Fixed7_25, Fixed23_9, Temp};

// ─── Control records ────────────────────────────────────────────────
pub use crate::control::error::{RecordError, SettingError, TickFlags};
pub use crate::control::record::Record;
pub use crate::control::settings::{
    ControlConstants, ControlSettings, ControlVariables, FilterSelectors,
};
pub use crate::control::state::{ControlMode, ControlState, TempFormat};
pub use crate::control::timing::DwellTimes;

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{STORE_SIZE, TICK_PERIOD_MS};

/// Control tick period as Duration.
pub const TICK_PERIOD: Duration = Duration::from_millis(TICK_PERIOD_MS);
