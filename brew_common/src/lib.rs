//! Brew Common Library
//!
//! Shared fixed-point arithmetic, control records and configuration
//! loading for the fermentation chamber workspace.
//!
//! # Module Structure
//!
//! - [`fixed`] - 7.9 / 7.25 / 23.9 fixed-point types
//! - [`control`] - Modes, states, settings, constants and store layout
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Timing defaults and limits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! brew_common = { path = "../brew_common" }
//! ```
//!
//! ```rust
//! use brew_common::prelude::*;
//!
//! let setpoint = Temp::from_int(20);
//! assert_eq!(setpoint.to_string(), "20.00");
//! ```

pub mod config;
pub mod consts;
pub mod control;
pub mod fixed;
pub mod prelude;
