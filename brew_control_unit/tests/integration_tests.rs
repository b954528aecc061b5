//! Integration tests for the Brew Control Unit.
//!
//! These tests drive the whole control loop across several ticks: sensors,
//! state machine, estimators, actuators and the settings store together.

mod integration;
