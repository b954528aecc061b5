//! Paced control cycle: simulate → tick → record.
//!
//! Runs [`ControlLoop::tick`] once per control period against the chamber
//! simulator, with cycle time measurement and overrun counting.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` to lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)` for RT priority.
//!
//! ## Pacing
//! With the `rt` feature: absolute-time sleep on `CLOCK_MONOTONIC`.
//! Without it: `std::thread::sleep` for the remainder of the period.
//! In fast mode the loop does not sleep at all; the controller clock is the
//! tick count either way, so a fast run replays hours in seconds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use brew_common::consts::TICK_PERIOD_MS;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::{ControlLoop, TickReport};
use crate::sim::Chamber;
use crate::state::timers::Seconds;
use crate::store::SettingsStore;

/// Status line interval in ticks.
const STATUS_INTERVAL: u64 = 60;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles whose body took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT setup or pacing.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// Monotonic clock unavailable.
    #[error("clock error: {0}")]
    Clock(String),
}

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never faults a stack page in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence. All calls are no-ops without the `rt` feature.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// How the runner paces and bounds the loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Do not sleep between ticks.
    pub fast: bool,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
}

/// Drives one controller against the simulated chamber.
pub struct CycleRunner<S: SettingsStore> {
    pub controller: ControlLoop<S>,
    pub chamber: Chamber,
    pub stats: CycleStats,
    running: Arc<AtomicBool>,
    options: RunOptions,
    period_ns: i64,
    /// Controller clock [s].
    now: Seconds,
}

impl<S: SettingsStore> CycleRunner<S> {
    /// `running` is cleared by the signal handler to stop the loop.
    pub fn new(
        controller: ControlLoop<S>,
        chamber: Chamber,
        running: Arc<AtomicBool>,
        options: RunOptions,
    ) -> Self {
        Self {
            controller,
            chamber,
            stats: CycleStats::new(),
            running,
            options,
            period_ns: TICK_PERIOD_MS as i64 * 1_000_000,
            now: 0,
        }
    }

    #[inline]
    pub fn now(&self) -> Seconds {
        self.now
    }

    fn keep_going(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self
                .options
                .max_ticks
                .is_none_or(|max| self.stats.cycle_count < max)
    }

    /// Advance the clock by one second, step the chamber and run one tick.
    pub fn step(&mut self) -> TickReport {
        self.now += 1;
        self.chamber.step(self.now);
        let report = self.controller.tick(self.now, &mut self.chamber.io());

        if report.flags.has_sensor_fault() {
            debug!(now = report.now, flags = ?report.flags, "sensor fault");
        }
        if self.stats.cycle_count % STATUS_INTERVAL == 0 {
            info!(
                now = report.now,
                state = %report.state,
                beer = ?report.beer,
                fridge = ?report.fridge,
                beer_setting = ?report.beer_setting,
                fridge_setting = ?report.fridge_setting,
                "status"
            );
        }
        report
    }

    /// Run until `running` is cleared or `max_ticks` is reached.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!(
            fast = self.options.fast,
            max_ticks = ?self.options.max_ticks,
            period_ms = TICK_PERIOD_MS,
            "control loop started"
        );

        let result = if self.options.fast {
            self.run_fast_loop();
            Ok(())
        } else {
            self.run_paced()
        };

        info!(
            cycles = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1000,
            max_us = self.stats.max_cycle_ns / 1000,
            overruns = self.stats.overruns,
            "control loop stopped"
        );
        result
    }

    #[cfg(feature = "rt")]
    fn run_paced(&mut self) -> Result<(), CycleError> {
        self.run_rt_loop()
    }

    #[cfg(not(feature = "rt"))]
    fn run_paced(&mut self) -> Result<(), CycleError> {
        self.run_sim_loop();
        Ok(())
    }

    fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > self.period_ns {
            self.stats.overruns += 1;
            warn!(duration_ns, budget_ns = self.period_ns, "cycle overrun");
        }
    }

    fn run_fast_loop(&mut self) {
        while self.keep_going() {
            let start = Instant::now();
            self.step();
            self.record(start.elapsed().as_nanos() as i64, 0);
        }
    }

    /// Cycle loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || clock_gettime(clock).map_err(|e| CycleError::Clock(format!("clock_gettime: {e}")));
        let mut next_wake = now()?;

        while self.keep_going() {
            next_wake = timespec_add_ns(next_wake, self.period_ns);

            let cycle_start = now()?;
            self.step();
            let cycle_end = now()?;

            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            let latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();
            self.record(duration_ns, latency_ns);

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Cycle loop using `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) {
        let period = std::time::Duration::from_nanos(self.period_ns as u64);

        while self.keep_going() {
            let cycle_start = Instant::now();
            self.step();
            let elapsed = cycle_start.elapsed();
            self.record(elapsed.as_nanos() as i64, 0);

            if let Some(remaining) = period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
