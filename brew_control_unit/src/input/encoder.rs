//! Rotary encoder cell shared between pin interrupts and the main loop.
//!
//! Position, range, debounce timestamps and the push flag live in one
//! [`EncoderRecord`] behind a `critical_section::Mutex<Cell<_>>`. Every entry
//! point copies the record out, updates it, and writes it back inside a
//! single critical section, so an interrupt never sees a half-updated
//! record and `read` never races an edge.
//!
//! The position counts half steps: one detent is two edges. A read between
//! the two edges of a detent returns the last full-step value.

use core::cell::Cell;

use critical_section::Mutex;

/// Edges closer together than this are contact bounce [µs].
pub const DEBOUNCE_US: u32 = 500;

/// Push presses closer together than this are bounce [µs].
pub const PUSH_DEBOUNCE_US: u32 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EncoderRecord {
    /// Position in half steps.
    steps: i32,
    min: i32,
    max: i32,
    /// Last full-step value returned by `read`.
    prev_read: i32,
    pin_a: bool,
    pin_b: bool,
    last_edge_us: u32,
    last_push_us: u32,
    pushed: bool,
}

impl EncoderRecord {
    const fn new() -> Self {
        Self {
            steps: 0,
            min: 0,
            max: 0,
            prev_read: 0,
            pin_a: false,
            pin_b: false,
            last_edge_us: 0,
            last_push_us: 0,
            pushed: false,
        }
    }

    fn debounced(&mut self, now_us: u32) -> bool {
        if now_us.wrapping_sub(self.last_edge_us) < DEBOUNCE_US {
            return false;
        }
        self.last_edge_us = now_us;
        true
    }

    fn step(&mut self, delta: i32) {
        self.steps += delta;
        if self.steps >= self.max + 2 {
            self.steps = self.min;
        } else if self.steps <= self.min - 2 {
            self.steps = self.max;
        }
    }

    const fn full_step(&self) -> Option<i32> {
        if self.steps & 1 == 0 {
            Some(self.steps / 2)
        } else {
            None
        }
    }
}

/// Interrupt-safe rotary encoder state.
///
/// ```rust
/// use brew_control_unit::input::encoder::EncoderCell;
///
/// static ENCODER: EncoderCell = EncoderCell::new();
///
/// ENCODER.set_range(20, 0, 40);
/// assert_eq!(ENCODER.read(), 20);
/// ```
pub struct EncoderCell {
    inner: Mutex<Cell<EncoderRecord>>,
}

impl EncoderCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(EncoderRecord::new())),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut EncoderRecord) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut record = cell.get();
            let result = f(&mut record);
            cell.set(record);
            result
        })
    }

    // ─── Interrupt side ─────────────────────────────────────────────

    /// Edge on pin A, `level` is the new pin level.
    pub fn on_pin_a(&self, level: bool, now_us: u32) {
        self.update(|r| {
            if !r.debounced(now_us) {
                return;
            }
            r.pin_a = level;
            r.step(if r.pin_a != r.pin_b { 1 } else { -1 });
        });
    }

    /// Edge on pin B, `level` is the new pin level.
    pub fn on_pin_b(&self, level: bool, now_us: u32) {
        self.update(|r| {
            if !r.debounced(now_us) {
                return;
            }
            r.pin_b = level;
            r.step(if r.pin_a == r.pin_b { 1 } else { -1 });
        });
    }

    /// Push button pressed.
    pub fn on_push(&self, now_us: u32) {
        self.update(|r| {
            if now_us.wrapping_sub(r.last_push_us) >= PUSH_DEBOUNCE_US {
                r.last_push_us = now_us;
                r.pushed = true;
            }
        });
    }

    // ─── Main-loop side ─────────────────────────────────────────────

    /// Start at `start`, wrapping within `[min, max]`.
    pub fn set_range(&self, start: i16, min: i16, max: i16) {
        self.update(|r| {
            r.min = i32::from(min) * 2;
            r.max = i32::from(max) * 2;
            r.steps = i32::from(start.clamp(min, max)) * 2;
            r.prev_read = i32::from(start.clamp(min, max));
        });
    }

    /// Current full-step position.
    pub fn read(&self) -> i16 {
        self.update(|r| {
            if let Some(value) = r.full_step() {
                r.prev_read = value;
            }
            r.prev_read as i16
        })
    }

    /// Whether the full-step position moved since the last `read`.
    pub fn changed(&self) -> bool {
        self.update(|r| r.full_step().is_some_and(|v| v != r.prev_read))
    }

    pub fn pushed(&self) -> bool {
        self.update(|r| r.pushed)
    }

    pub fn reset_pushed(&self) {
        self.update(|r| r.pushed = false);
    }
}

impl Default for EncoderCell {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EncoderCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let record = critical_section::with(|cs| self.inner.borrow(cs).get());
        f.debug_struct("EncoderCell")
            .field("steps", &record.steps)
            .field("pushed", &record.pushed)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
