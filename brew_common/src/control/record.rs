//! Fixed byte layout of the durable settings store.
//!
//! ```text
//! offset 0              format marker (STORE_FORMAT_VERSION once initialised)
//! offset 1              ControlSettings   (SETTINGS_SIZE bytes)
//! offset 1 + settings   ControlConstants  (CONSTANTS_SIZE bytes)
//! ```
//!
//! All multi-byte fields are little-endian. An absent setpoint is written as
//! `i16::MIN`; the sentinel exists only in this byte layout and is decoded
//! back into `None`.

use static_assertions::const_assert;

use crate::consts::STORE_SIZE;
use crate::fixed::Temp;

use super::error::RecordError;
use super::settings::{ControlConstants, ControlSettings, FilterSelectors};
use super::state::{ControlMode, TempFormat};

/// Largest encoded record.
pub const MAX_RECORD_SIZE: usize = 64;

/// Encoded record bytes.
pub type RecordBuf = heapless::Vec<u8, MAX_RECORD_SIZE>;

pub const FORMAT_MARKER_OFFSET: u16 = 0;
pub const SETTINGS_OFFSET: u16 = FORMAT_MARKER_OFFSET + 1;
/// mode + 4 × 7.9
pub const SETTINGS_SIZE: usize = 1 + 4 * 2;
pub const CONSTANTS_OFFSET: u16 = SETTINGS_OFFSET + SETTINGS_SIZE as u16;
/// format + 12 × 7.9 + 2 × u16 + 6 filter selectors + light flag
pub const CONSTANTS_SIZE: usize = 1 + 12 * 2 + 2 * 2 + 6 + 1;

const_assert!(SETTINGS_SIZE <= MAX_RECORD_SIZE);
const_assert!(CONSTANTS_SIZE <= MAX_RECORD_SIZE);
const_assert!(CONSTANTS_OFFSET as usize + CONSTANTS_SIZE <= STORE_SIZE);

const ABSENT_SETPOINT: i16 = i16::MIN;

/// A record with a fixed place in the store.
pub trait Record: Sized {
    const NAME: &'static str;
    const OFFSET: u16;
    const SIZE: usize;

    fn encode(&self) -> RecordBuf;

    fn decode(bytes: &[u8]) -> Result<Self, RecordError>;
}

// ─── Codec helpers ──────────────────────────────────────────────────

struct Writer {
    buf: RecordBuf,
}

impl Writer {
    fn new() -> Self {
        Self {
            buf: RecordBuf::new(),
        }
    }

    // Record sizes are const-asserted against the buffer capacity.
    fn bytes(&mut self, bytes: &[u8]) {
        let _ = self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn temp(&mut self, v: Temp) {
        self.bytes(&v.raw().to_le_bytes());
    }

    fn opt_temp(&mut self, v: Option<Temp>) {
        let raw = v.map_or(ABSENT_SETPOINT, Temp::raw);
        self.bytes(&raw.to_le_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], size: usize) -> Result<Self, RecordError> {
        if bytes.len() < size {
            return Err(RecordError::Truncated {
                needed: size,
                available: bytes.len(),
            });
        }
        Ok(Self { bytes, pos: 0 })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], RecordError> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or(RecordError::Truncated {
            needed: end,
            available: self.bytes.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, RecordError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, RecordError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn temp(&mut self) -> Result<Temp, RecordError> {
        Ok(Temp::from_raw(i16::from_le_bytes(self.take()?)))
    }

    fn opt_temp(&mut self) -> Result<Option<Temp>, RecordError> {
        let raw = i16::from_le_bytes(self.take()?);
        Ok((raw != ABSENT_SETPOINT).then_some(Temp::from_raw(raw)))
    }

    fn bool(&mut self, field: &'static str) -> Result<bool, RecordError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(RecordError::InvalidByte { field, value }),
        }
    }
}

// ─── Records ────────────────────────────────────────────────────────

impl Record for ControlSettings {
    const NAME: &'static str = "settings";
    const OFFSET: u16 = SETTINGS_OFFSET;
    const SIZE: usize = SETTINGS_SIZE;

    fn encode(&self) -> RecordBuf {
        let mut w = Writer::new();
        w.u8(self.mode.code());
        w.opt_temp(self.beer_setting);
        w.opt_temp(self.fridge_setting);
        w.temp(self.heat_estimator);
        w.temp(self.cool_estimator);
        w.buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut r = Reader::new(bytes, Self::SIZE)?;
        let code = r.u8()?;
        let mode = ControlMode::from_code(code).ok_or(RecordError::InvalidByte {
            field: "mode",
            value: code,
        })?;
        Ok(Self {
            mode,
            beer_setting: r.opt_temp()?,
            fridge_setting: r.opt_temp()?,
            heat_estimator: r.temp()?,
            cool_estimator: r.temp()?,
        })
    }
}

impl Record for ControlConstants {
    const NAME: &'static str = "constants";
    const OFFSET: u16 = CONSTANTS_OFFSET;
    const SIZE: usize = CONSTANTS_SIZE;

    fn encode(&self) -> RecordBuf {
        let mut w = Writer::new();
        w.u8(self.temp_format.code());
        for t in [
            self.temp_setting_min,
            self.temp_setting_max,
            self.kp,
            self.ki,
            self.kd,
            self.i_max_error,
            self.idle_range_high,
            self.idle_range_low,
            self.heating_target_upper,
            self.heating_target_lower,
            self.cooling_target_upper,
            self.cooling_target_lower,
        ] {
            w.temp(t);
        }
        w.u16(self.max_heat_time_for_estimate);
        w.u16(self.max_cool_time_for_estimate);
        w.bytes(&self.filters.as_array());
        w.u8(self.light_as_heater as u8);
        w.buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut r = Reader::new(bytes, Self::SIZE)?;
        let code = r.u8()?;
        let temp_format = TempFormat::from_code(code).ok_or(RecordError::InvalidByte {
            field: "temp_format",
            value: code,
        })?;
        Ok(Self {
            temp_format,
            temp_setting_min: r.temp()?,
            temp_setting_max: r.temp()?,
            kp: r.temp()?,
            ki: r.temp()?,
            kd: r.temp()?,
            i_max_error: r.temp()?,
            idle_range_high: r.temp()?,
            idle_range_low: r.temp()?,
            heating_target_upper: r.temp()?,
            heating_target_lower: r.temp()?,
            cooling_target_upper: r.temp()?,
            cooling_target_lower: r.temp()?,
            max_heat_time_for_estimate: r.u16()?,
            max_cool_time_for_estimate: r.u16()?,
            filters: FilterSelectors {
                fridge_fast: r.u8()?,
                fridge_slow: r.u8()?,
                fridge_slope: r.u8()?,
                beer_fast: r.u8()?,
                beer_slow: r.u8()?,
                beer_slope: r.u8()?,
            },
            light_as_heater: r.bool("light_as_heater")?,
        })
    }
}
