//! # Brew Control Unit Library
//!
//! Fermentation chamber temperature control. Two probes (beer and fridge
//! air), a cooler, a heater and a door switch are driven by a 1 s control
//! tick that filters the probes, places the fridge setpoint with a PID on
//! the beer error, runs a compressor-safe on/off state machine and learns
//! the heating/cooling overshoot from detected fridge peaks.
//!
//! ## Layout
//!
//! - [`control`]: fixed-point filter, probe channel, PID, overshoot estimator
//! - [`state`]: dwell timers and the chamber state machine
//! - [`controller`]: the owned [`controller::ControlLoop`] tying them together
//! - [`io`] / [`store`]: hardware and persistence boundaries
//! - [`input`]: interrupt-shared rotary encoder cell
//! - [`sim`] / [`cycle`]: chamber simulator and the paced runner
//!
//! The control path performs no heap allocation and never blocks.

pub mod config;
pub mod control;
pub mod controller;
pub mod cycle;
pub mod input;
pub mod io;
pub mod sim;
pub mod state;
pub mod store;
