//! Self-learning overshoot estimators.
//!
//! The heat and cool estimators predict how far the fridge temperature keeps
//! moving after an actuator stops, per hour of actuation. When a peak is
//! detected after a cycle, the error against the peak estimated at stop time
//! nudges the estimator. Increases use a larger step than decreases:
//! underestimating the overshoot stops the next cycle too late, which is the
//! outcome to correct fastest.

use brew_common::consts::ESTIMATOR_FLOOR_RAW;
use brew_common::control::settings::ControlConstants;
use brew_common::fixed::Temp;

/// 1.2 in 7.9.
const INCREASE_BASE: i32 = 614;
/// Caps the increase factor at 1.5.
const INCREASE_MAX_EXTRA: i32 = 154;
/// 0.833 in 7.9.
const DECREASE_BASE: i32 = 426;
/// Floors the decrease factor at 0.667.
const DECREASE_MAX_EXTRA: i32 = 85;
/// Error scaling: 1/32 of the error, about 3% per degree.
const ERROR_SHIFT: u32 = 5;

/// Which estimator a learning step applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakKind {
    /// Fridge maximum after heating.
    Positive,
    /// Fridge minimum after cooling.
    Negative,
}

/// Outcome of one learning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increased(Temp),
    Decreased(Temp),
    /// Error inside the target band.
    Kept,
}

fn scaled_error(error: Temp, max: i32) -> i32 {
    ((error.abs().raw() as i32) >> ERROR_SHIFT).clamp(0, max)
}

fn apply_factor(estimator: Temp, factor: i32) -> Temp {
    let product = (estimator.raw() as i32) * factor;
    let scaled = Temp::from_wide(product >> 9);
    scaled.max(Temp::from_raw(ESTIMATOR_FLOOR_RAW))
}

/// Grow the estimator by `1.2 + |error|/32`, capped at ×1.5.
pub fn increase_estimator(estimator: Temp, error: Temp) -> Temp {
    apply_factor(
        estimator,
        INCREASE_BASE + scaled_error(error, INCREASE_MAX_EXTRA),
    )
}

/// Shrink the estimator by `0.833 − |error|/32`, floored at ×0.667. The
/// result never drops below 0.05.
pub fn decrease_estimator(estimator: Temp, error: Temp) -> Temp {
    apply_factor(
        estimator,
        DECREASE_BASE - scaled_error(error, DECREASE_MAX_EXTRA),
    )
}

/// Learning step for a detected peak. `error` is the detected peak minus
/// the peak estimated when the actuator stopped.
pub fn learn(kind: PeakKind, estimator: Temp, error: Temp, cc: &ControlConstants) -> Adjustment {
    let (overshot, undershot) = match kind {
        // Heating overshoot pushes the peak up.
        PeakKind::Positive => (
            error > cc.heating_target_upper,
            error < cc.heating_target_lower,
        ),
        // Cooling overshoot pushes the peak down.
        PeakKind::Negative => (
            error < cc.cooling_target_lower,
            error > cc.cooling_target_upper,
        ),
    };
    if overshot {
        Adjustment::Increased(increase_estimator(estimator, error))
    } else if undershot {
        Adjustment::Decreased(decrease_estimator(estimator, error))
    } else {
        Adjustment::Kept
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
