//! Control-core types shared by the controller, the settings store and
//! the host link.
//!
//! Organized by domain: mode and state enums, settings/constants/variables
//! records, dwell timing, per-tick flags and errors, and the store byte
//! layout.

pub mod error;
pub mod record;
pub mod settings;
pub mod state;
pub mod timing;
