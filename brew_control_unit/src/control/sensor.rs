//! One temperature probe with its fast, slow and slope filters.

use brew_common::consts::{SLOPE_DIFF_LIMIT, SLOPE_PER_HOUR_SCALE, SLOPE_UPDATE_INTERVAL};
use brew_common::fixed::{DOUBLE_PRECISION_SHIFT, Fixed7_25, Temp};
use tracing::{info, warn};

use super::filter::FixedFilter;

/// Filtered view of one probe.
///
/// The fast filter feeds on/off control and display, the slow filter feeds
/// the PID error and peak detection, and the slope filter turns fast-filter
/// deltas into a rate in °C per hour.
#[derive(Debug, Clone)]
pub struct TempSensor {
    name: &'static str,
    fast: FixedFilter,
    slow: FixedFilter,
    slope: FixedFilter,
    /// Fast output at the last slope update.
    prev_for_slope: Fixed7_25,
    slope_countdown: u8,
    connected: bool,
}

impl TempSensor {
    pub const fn new(name: &'static str, fast_b: u8, slow_b: u8, slope_b: u8) -> Self {
        Self {
            name,
            fast: FixedFilter::new(fast_b),
            slow: FixedFilter::new(slow_b),
            slope: FixedFilter::new(slope_b),
            prev_for_slope: Fixed7_25::ZERO,
            slope_countdown: SLOPE_UPDATE_INTERVAL,
            connected: false,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn set_filter_coefficients(&mut self, fast_b: u8, slow_b: u8, slope_b: u8) {
        self.fast.set_coefficient(fast_b);
        self.slow.set_coefficient(slow_b);
        self.slope.set_coefficient(slope_b);
    }

    /// Seed all filters with `value` and a zero slope.
    pub fn init(&mut self, value: Temp) {
        self.fast.init(value);
        self.slow.init(value);
        self.slope.init(Temp::ZERO);
        self.prev_for_slope = self.fast.read_double_precision();
        self.slope_countdown = SLOPE_UPDATE_INTERVAL;
        self.connected = true;
    }

    /// Feed one reading. `None` is a failed read: filters hold their last
    /// output and the probe is marked disconnected. The first valid reading
    /// after a failure re-seeds the filters.
    ///
    /// Returns whether the reading was valid.
    pub fn update(&mut self, reading: Option<Temp>) -> bool {
        let Some(value) = reading else {
            if self.connected {
                warn!(sensor = self.name, held = %self.read_fast(), "temperature sensor lost");
            }
            self.connected = false;
            return false;
        };

        if !self.connected {
            info!(sensor = self.name, value = %value, "temperature sensor connected");
            self.init(value);
        }

        self.fast.add(value);
        self.slow.add(value);

        self.slope_countdown = self.slope_countdown.saturating_sub(1);
        if self.slope_countdown == 0 {
            self.update_slope();
            self.slope_countdown = SLOPE_UPDATE_INTERVAL;
        }
        true
    }

    fn update_slope(&mut self) {
        let current = self.fast.read_double_precision();
        let limit = SLOPE_DIFF_LIMIT << DOUBLE_PRECISION_SHIFT;
        let diff = current
            .saturating_sub(self.prev_for_slope)
            .raw()
            .clamp(-limit, limit);
        // Bounded by SLOPE_DIFF_LIMIT, the product stays inside i32.
        let per_hour = Fixed7_25::from_wide(diff as i64 * SLOPE_PER_HOUR_SCALE as i64);
        self.slope.add_double_precision(per_hour);
        self.prev_for_slope = current;
    }

    /// Forget the filter history. The next valid reading re-seeds.
    pub fn reset(&mut self) {
        self.connected = false;
    }

    #[inline]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    #[inline]
    pub const fn read_fast(&self) -> Temp {
        self.fast.read()
    }

    #[inline]
    pub const fn read_slow(&self) -> Temp {
        self.slow.read()
    }

    /// Rate of change in °C per hour.
    #[inline]
    pub const fn read_slope(&self) -> Temp {
        self.slope.read()
    }

    pub fn detect_pos_peak(&self) -> Option<Temp> {
        self.slow.detect_pos_peak()
    }

    pub fn detect_neg_peak(&self) -> Option<Temp> {
        self.slow.detect_neg_peak()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
