//! Fixed-point PID placing the fridge setpoint from the beer error.
//!
//! The output never drives an actuator directly: it moves the fridge
//! setpoint, and the on/off state machine tracks that setpoint.
//!
//! The integrator only admits errors inside ±`i_max_error`, and only while
//! the fridge side is not saturated; outside that it decays by 1/8 per
//! update, which keeps the integral from winding up.

use brew_common::control::settings::{ControlConstants, ControlVariables};
use brew_common::fixed::{Fixed23_9, Temp};

/// Fridge air more than this far from its setpoint means the actuator is
/// already running flat out (2.0 °C).
const SATURATION_BAND: Temp = Temp::from_int(2);

/// Per-update context for the integrator.
#[derive(Debug, Clone, Copy)]
pub struct IntegratorContext {
    /// Only an idle chamber has reached its fridge setpoint; only then is
    /// remaining beer error a sign the setpoint itself is off.
    pub idle: bool,
    pub fridge_setting: Option<Temp>,
    pub fridge_fast: Temp,
}

/// Advance the integral by one update period.
pub fn update_integral(vars: &mut ControlVariables, cc: &ControlConstants, ctx: IntegratorContext) {
    let diff = vars.beer_diff;
    let integral = vars.diff_integral;

    let step = if !ctx.idle {
        Fixed23_9::ZERO
    } else if diff.abs() < cc.i_max_error {
        let increasing = diff.is_positive();
        if increasing == (integral.raw() > 0) {
            if fridge_saturated(ctx, cc, increasing) {
                Fixed23_9::ZERO
            } else {
                diff.widen()
            }
        } else {
            // Unwinding: twice as fast as winding up.
            diff.widen().saturating_add(diff.widen())
        }
    } else {
        Fixed23_9::from_raw(-(integral.raw() >> 3))
    };

    vars.diff_integral = integral.saturating_add(step);
}

fn fridge_saturated(ctx: IntegratorContext, cc: &ControlConstants, heating: bool) -> bool {
    let Some(setting) = ctx.fridge_setting else {
        return true;
    };
    if setting >= cc.temp_setting_max || setting <= cc.temp_setting_min {
        return true;
    }
    if heating {
        ctx.fridge_fast < setting - SATURATION_BAND
    } else {
        ctx.fridge_fast > setting + SATURATION_BAND
    }
}

/// Recompute p, i and d and return the new fridge setpoint, clamped to the
/// configured setpoint limits.
pub fn pid_compute(
    vars: &mut ControlVariables,
    cc: &ControlConstants,
    beer_setting: Temp,
    beer_slow: Temp,
    beer_slope: Temp,
) -> Temp {
    vars.beer_diff = beer_setting - beer_slow;
    vars.beer_slope = beer_slope;

    vars.p = cc.kp.mul(vars.beer_diff);
    vars.i = vars.diff_integral.mul_temp(cc.ki).to_temp();
    vars.d = cc.kd.mul(vars.beer_slope);

    let sum = beer_setting
        .widen()
        .saturating_add(vars.p.widen())
        .saturating_add(vars.i.widen())
        .saturating_add(vars.d.widen());
    let min = cc.temp_setting_min.widen();
    let max = cc.temp_setting_max.widen();
    sum.clamp(min, max).to_temp()
}

// ─── Tests ──────────────────────────────────────────────────────────
