//! Control engine root.
//!
//! Fixed-point signal path and learning: filters, probe channels, the
//! fridge-setpoint PID and the overshoot estimators.

pub mod estimator;
pub mod filter;
pub mod pid;
pub mod sensor;
