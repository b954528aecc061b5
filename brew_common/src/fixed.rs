//! Fixed-point numeric types.
//!
//! The control core never touches floating point. Temperatures, gains and
//! estimators are stored as signed 7.9 values (`Temp`, resolution 1/512),
//! the filters run internally on 7.25 values (`Fixed7_25`) and the PID
//! integral accumulates in 23.9 (`Fixed23_9`).
//!
//! Every operation either saturates or is computed in a wider intermediate
//! and clamped back. `f64` conversions exist for configuration files,
//! logging and tests only.

use core::fmt;
use core::ops::{Add, Neg, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fractional bits of the 7.9 format.
pub const FRACTION_BITS: u32 = 9;

/// Raw representation of 1.0 in 7.9.
pub const ONE_RAW: i16 = 1 << FRACTION_BITS;

/// Extra fractional bits used by `Fixed7_25` over `Temp`.
pub const DOUBLE_PRECISION_SHIFT: u32 = 16;

// ─── 7.9 ────────────────────────────────────────────────────────────

/// Signed 7.9 fixed-point value (range ±64.0, resolution 1/512).
///
/// Used for every temperature, temperature difference, gain and estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Temp(i16);

impl Temp {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_RAW);
    pub const MIN: Self = Self(i16::MIN);
    pub const MAX: Self = Self(i16::MAX);

    /// Wrap a raw 7.9 value.
    #[inline]
    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    /// Raw 7.9 bits.
    #[inline]
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Whole degrees, saturating at the representable range.
    #[inline]
    pub const fn from_int(degrees: i16) -> Self {
        Self::from_wide((degrees as i32) << FRACTION_BITS)
    }

    /// Clamp a wider raw 7.9 value into range.
    #[inline]
    pub const fn from_wide(raw: i32) -> Self {
        if raw > i16::MAX as i32 {
            Self::MAX
        } else if raw < i16::MIN as i32 {
            Self::MIN
        } else {
            Self(raw as i16)
        }
    }

    /// Nearest 7.9 value, saturating. NaN maps to zero.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        let scaled = (value * ONE_RAW as f64).round();
        if scaled >= i16::MAX as f64 {
            Self::MAX
        } else if scaled <= i16::MIN as f64 {
            Self::MIN
        } else {
            Self(scaled as i16)
        }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE_RAW as f64
    }

    #[inline]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// 7.9 × 7.9 product, computed in 23.9 and saturated back.
    #[inline]
    pub const fn mul(self, rhs: Self) -> Self {
        self.mul_wide(rhs).to_temp()
    }

    /// 7.9 × 7.9 product kept in 23.9.
    #[inline]
    pub const fn mul_wide(self, rhs: Self) -> Fixed23_9 {
        Fixed23_9(((self.0 as i32) * (rhs.0 as i32)) >> FRACTION_BITS)
    }

    /// Promote to 23.9 without loss.
    #[inline]
    pub const fn widen(self) -> Fixed23_9 {
        Fixed23_9(self.0 as i32)
    }

    /// Promote to filter precision (7.25).
    #[inline]
    pub const fn to_double_precision(self) -> Fixed7_25 {
        Fixed7_25((self.0 as i32) << DOUBLE_PRECISION_SHIFT)
    }

    /// Convert an absolute Celsius value to Fahrenheit. Kept in 23.9 since
    /// fermentation temperatures in Fahrenheit exceed the 7.9 range.
    pub const fn celsius_to_fahrenheit(self) -> Fixed23_9 {
        Fixed23_9((self.0 as i32) * 9 / 5 + 32 * ONE_RAW as i32)
    }

    /// Convert an absolute Fahrenheit value to Celsius.
    pub const fn fahrenheit_to_celsius(fahrenheit: Fixed23_9) -> Self {
        Self::from_wide((fahrenheit.raw() - 32 * ONE_RAW as i32) * 5 / 9)
    }

    /// Convert a Celsius difference to a Fahrenheit difference.
    pub const fn celsius_diff_to_fahrenheit(self) -> Self {
        Self::from_wide((self.0 as i32) * 9 / 5)
    }

    /// Convert a Fahrenheit difference to a Celsius difference.
    pub const fn fahrenheit_diff_to_celsius(self) -> Self {
        Self::from_wide((self.0 as i32) * 5 / 9)
    }
}

impl Add for Temp {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl Sub for Temp {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Neg for Temp {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

/// Two decimals, rounded half away from zero, integer-only.
fn write_hundredths(f: &mut fmt::Formatter<'_>, raw: i64) -> fmt::Result {
    let half = ONE_RAW as i64 / 2;
    let magnitude = (raw.abs() * 100 + half) / ONE_RAW as i64;
    let sign = if raw < 0 && magnitude != 0 { "-" } else { "" };
    write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hundredths(f, self.0 as i64)
    }
}

// Config files carry human-readable degrees.
impl Serialize for Temp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Temp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = f64::deserialize(deserializer)?;
        Ok(Self::from_f64(degrees))
    }
}

// ─── 7.25 ───────────────────────────────────────────────────────────

/// Signed 7.25 fixed-point value used inside the filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed7_25(i32);

impl Fixed7_25 {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Clamp a 64-bit intermediate into range.
    #[inline]
    pub const fn from_wide(raw: i64) -> Self {
        if raw > i32::MAX as i64 {
            Self(i32::MAX)
        } else if raw < i32::MIN as i64 {
            Self(i32::MIN)
        } else {
            Self(raw as i32)
        }
    }

    /// Drop back to 7.9. An arithmetic shift of an i32 by 16 always fits i16.
    #[inline]
    pub const fn to_temp(self) -> Temp {
        Temp((self.0 >> DOUBLE_PRECISION_SHIFT) as i16)
    }

    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

// ─── 23.9 ───────────────────────────────────────────────────────────

/// Signed 23.9 fixed-point value: 7.9 resolution with headroom for
/// long integration windows and intermediate products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed23_9(i32);

impl Fixed23_9 {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// 23.9 × 7.9 product, computed in 64 bits and saturated.
    #[inline]
    pub const fn mul_temp(self, rhs: Temp) -> Self {
        let wide = ((self.0 as i64) * (rhs.raw() as i64)) >> FRACTION_BITS;
        if wide > i32::MAX as i64 {
            Self(i32::MAX)
        } else if wide < i32::MIN as i64 {
            Self(i32::MIN)
        } else {
            Self(wide as i32)
        }
    }

    /// Saturate into 7.9.
    #[inline]
    pub const fn to_temp(self) -> Temp {
        Temp::from_wide(self.0)
    }
}

impl fmt::Display for Fixed23_9 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hundredths(f, self.0 as i64)
    }
}
