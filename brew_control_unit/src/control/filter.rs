//! Cascaded single-pole low-pass filter in fixed point, with peak detection.
//!
//! Each instance keeps three samples of input and output history at 7.25
//! precision. The shift pair is derived from one selector `b`, with
//! `a = 2b + 4`; higher `b` means heavier smoothing and a lower cutoff.
//!
//! ```text
//! y0 = ((y1 - y2) + y1) - (y1 >> b) + (y2 >> b)
//!      + (x0 >> a) + (x1 >> (a - 1)) + (x2 >> a)
//!      - (y2 >> (a - 2))
//! ```
//!
//! The partial sums are evaluated in exactly this order: each group has an
//! expected value close to a multiple of the signal, so the accumulator never
//! holds more than a few signal magnitudes. The sum is carried in 64 bits
//! and saturated back to 7.25, which matches a 32-bit accumulator
//! for every input that did not overflow there.

use brew_common::consts::MAX_FILTER_B;
use brew_common::fixed::{Fixed7_25, Temp};

/// Outputs that must come from `add` before peaks are reported. Seeded
/// history is flat and would otherwise look like a plateau.
const PEAK_HISTORY: u8 = 3;

#[derive(Debug, Clone)]
pub struct FixedFilter {
    a: u8,
    b: u8,
    /// Input history, most recent first.
    xv: [Fixed7_25; 3],
    /// Output history, most recent first.
    yv: [Fixed7_25; 3],
    /// Number of outputs produced by `add` since `init`, saturating.
    added: u8,
}

impl FixedFilter {
    /// Filter with selector `b`, clamped to `MAX_FILTER_B`. History starts
    /// at zero; call [`init`](Self::init) to seed it.
    pub const fn new(b: u8) -> Self {
        let b = if b > MAX_FILTER_B { MAX_FILTER_B } else { b };
        Self {
            a: 2 * b + 4,
            b,
            xv: [Fixed7_25::ZERO; 3],
            yv: [Fixed7_25::ZERO; 3],
            added: 0,
        }
    }

    /// Change the selector. History is kept.
    pub fn set_coefficient(&mut self, b: u8) {
        let b = b.min(MAX_FILTER_B);
        self.b = b;
        self.a = 2 * b + 4;
    }

    #[inline]
    pub const fn coefficient(&self) -> u8 {
        self.b
    }

    /// Seed every input and output slot with `value`. The next `add` of the
    /// same value returns it unchanged.
    pub fn init(&mut self, value: Temp) {
        self.init_double_precision(value.to_double_precision());
    }

    pub fn init_double_precision(&mut self, value: Fixed7_25) {
        self.xv = [value; 3];
        self.yv = [value; 3];
        self.added = 0;
    }

    /// Add one 7.9 sample and return the new output at 7.9.
    pub fn add(&mut self, sample: Temp) -> Temp {
        self.add_double_precision(sample.to_double_precision()).to_temp()
    }

    /// Add one 7.25 sample and return the new output at 7.25.
    pub fn add_double_precision(&mut self, sample: Fixed7_25) -> Fixed7_25 {
        self.xv = [sample, self.xv[0], self.xv[1]];
        self.yv = [Fixed7_25::ZERO, self.yv[0], self.yv[1]];

        let (a, b) = (self.a as u32, self.b as u32);
        let [x0, x1, x2] = self.xv.map(|x| x.raw() as i64);
        let y1 = self.yv[1].raw() as i64;
        let y2 = self.yv[2].raw() as i64;

        let expected = (y1 - y2) + y1;
        let damped = expected - (y1 >> b) + (y2 >> b);
        let driven = damped + (x0 >> a) + (x1 >> (a - 1)) + (x2 >> a);
        let y0 = driven - (y2 >> (a - 2));

        self.yv[0] = Fixed7_25::from_wide(y0);
        self.added = self.added.saturating_add(1);
        self.yv[0]
    }

    /// Latest output at 7.9.
    #[inline]
    pub const fn read(&self) -> Temp {
        self.yv[0].to_temp()
    }

    #[inline]
    pub const fn read_double_precision(&self) -> Fixed7_25 {
        self.yv[0]
    }

    /// Local maximum in the last three outputs. The middle sample must be
    /// strictly above the newest and at least equal to the oldest, so a
    /// plateau is reported once, on its trailing edge.
    pub fn detect_pos_peak(&self) -> Option<Temp> {
        let [y0, y1, y2] = self.yv;
        (self.added >= PEAK_HISTORY && y0 < y1 && y1 >= y2).then(|| y1.to_temp())
    }

    /// Local minimum in the last three outputs, tie-broken like
    /// [`detect_pos_peak`](Self::detect_pos_peak).
    pub fn detect_neg_peak(&self) -> Option<Temp> {
        let [y0, y1, y2] = self.yv;
        (self.added >= PEAK_HISTORY && y0 > y1 && y1 <= y2).then(|| y1.to_temp())
    }
}

impl Default for FixedFilter {
    fn default() -> Self {
        Self::new(0)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
