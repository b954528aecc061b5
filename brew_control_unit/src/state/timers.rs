//! Monotonic dwell timestamps.
//!
//! All times are seconds on the controller's monotonic tick clock. Elapsed
//! times saturate at zero if a caller ever passes an earlier `now`.

/// Seconds on the monotonic tick clock.
pub type Seconds = u32;

/// Last time each resting/active class was observed, plus the last state
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellTimers {
    last_idle: Seconds,
    last_heat: Seconds,
    last_cool: Seconds,
    state_since: Seconds,
}

impl DwellTimers {
    /// All timestamps start at boot, so a freshly powered compressor still
    /// sits out its off time.
    pub const fn new(boot: Seconds) -> Self {
        Self {
            last_idle: boot,
            last_heat: boot,
            last_cool: boot,
            state_since: boot,
        }
    }

    #[inline]
    pub fn mark_idle(&mut self, now: Seconds) {
        self.last_idle = now;
    }

    #[inline]
    pub fn mark_heating(&mut self, now: Seconds) {
        self.last_heat = now;
    }

    #[inline]
    pub fn mark_cooling(&mut self, now: Seconds) {
        self.last_cool = now;
    }

    #[inline]
    pub fn mark_state_change(&mut self, now: Seconds) {
        self.state_since = now;
    }

    #[inline]
    pub const fn since_idle(&self, now: Seconds) -> Seconds {
        now.saturating_sub(self.last_idle)
    }

    #[inline]
    pub const fn since_heating(&self, now: Seconds) -> Seconds {
        now.saturating_sub(self.last_heat)
    }

    #[inline]
    pub const fn since_cooling(&self, now: Seconds) -> Seconds {
        now.saturating_sub(self.last_cool)
    }

    #[inline]
    pub const fn time_in_state(&self, now: Seconds) -> Seconds {
        now.saturating_sub(self.state_since)
    }
}

/// Longest outstanding wait over a set of dwell gates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitTime(Seconds);

impl WaitTime {
    /// Gate that opens once `elapsed >= limit`.
    #[inline]
    pub fn require(&mut self, limit: Seconds, elapsed: Seconds) {
        self.0 = self.0.max(limit.saturating_sub(elapsed));
    }

    #[inline]
    pub const fn is_open(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn remaining(&self) -> Seconds {
        self.0
    }
}
