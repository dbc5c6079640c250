//! Slow call timing
//!
//! Wrap a call in a [`Timer`] and report it when it took unusually long. A
//! call slower than the hard limit is logged as a warning, one slower than
//! the debug threshold at debug level.

use chrono::{Duration as ChronoDuration, Local};
use std::time::Instant;
use tracing::{debug, warn};

/// Hard limit used when the caller passes 0 (microseconds)
pub const DEFAULT_LIMIT_US: u64 = 3_000_000;

/// Debug threshold used when the caller passes 0 (microseconds)
pub const DEFAULT_DEBUG_US: u64 = 1_000_000;

/// Warning and debug thresholds for slow calls, in microseconds
///
/// A zero `limit_us` selects both defaults. A zero `debug_us` with an
/// explicit limit reuses the limit as the debug threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlowCallLimits {
    pub limit_us: u64,
    pub debug_us: u64,
}

impl SlowCallLimits {
    pub fn new(limit_us: u64, debug_us: u64) -> Self {
        Self { limit_us, debug_us }
    }

    /// Only a hard limit; the debug threshold follows it
    pub fn limit(limit_us: u64) -> Self {
        Self::new(limit_us, 0)
    }

    fn thresholds(&self) -> (u64, u64) {
        match (self.limit_us, self.debug_us) {
            (0, _) => (DEFAULT_LIMIT_US, DEFAULT_DEBUG_US),
            (limit, 0) => (limit, limit),
            (limit, debug) => (limit, debug),
        }
    }
}

/// Outcome of a timed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerReport {
    /// Elapsed time in microseconds
    pub delta_us: u64,
    /// `usec=N`
    pub text: String,
    /// Whether the call crossed the warning limit
    pub slow: bool,
    /// Whether the call crossed only the debug threshold
    pub noted: bool,
}

/// Measures one call
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Stop timing and log the call if it was slow.
    ///
    /// See [`SlowCallLimits`] for how zero thresholds are resolved.
    pub fn finish(self, label: &str, limits: SlowCallLimits) -> TimerReport {
        report(label, self.elapsed_micros(), limits)
    }
}

/// Build the report for a measured delta and emit the matching event
pub fn report(label: &str, delta_us: u64, limits: SlowCallLimits) -> TimerReport {
    let (hard, soft) = limits.thresholds();
    let text = format!("usec={}", delta_us);
    let slow = delta_us > hard;
    let noted = !slow && delta_us > soft;

    if slow {
        warn!(
            "Warning: Note very large processing time from {}: {} began={}",
            label,
            text,
            began_at(delta_us)
        );
    } else if noted {
        debug!(
            "Note large processing time from {}: {} began={}",
            label,
            text,
            began_at(delta_us)
        );
    }

    TimerReport {
        delta_us,
        text,
        slow,
        noted,
    }
}

/// Run `f` under a timer labelled `label`
pub fn timed<T, F: FnOnce() -> T>(label: &str, limits: SlowCallLimits, f: F) -> (T, TimerReport) {
    let timer = Timer::start();
    let value = f();
    (value, timer.finish(label, limits))
}

/// Local wall clock time the call began, `HH:MM:SS`
fn began_at(delta_us: u64) -> String {
    let delta = ChronoDuration::microseconds(i64::try_from(delta_us).unwrap_or(i64::MAX));
    let began = Local::now()
        .checked_sub_signed(delta)
        .unwrap_or_else(Local::now);
    began.format("%H:%M:%S").to_string()
}
