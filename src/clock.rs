//! Time sources for the frame loop.
//!
//! The loop needs two things per frame: the wall-clock time (for the mode
//! schedule and the HUD) and the seconds elapsed since the previous frame
//! (to advance the simulation). [`SystemClock`] reads the real clock;
//! [`ManualClock`] is driven by hand in tests.

use chrono::{Local, NaiveTime, Timelike};
use std::time::Instant;

pub trait ClockSource {
    /// Local wall-clock time.
    fn now(&self) -> NaiveTime;

    /// Seconds since the previous call (the first call measures from creation).
    fn delta(&mut self) -> f32;

    /// Hour of day, 0-23.
    fn hour(&self) -> u32 {
        self.now().hour()
    }
}

/// The real clock: local time from chrono, deltas from a monotonic `Instant`.
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }

    fn delta(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}

/// A clock that only moves when told to.
///
/// Every `delta()` returns the fixed step and advances the wall time by it.
#[derive(Clone, Debug)]
pub struct ManualClock {
    time: NaiveTime,
    step: f32,
}

impl ManualClock {
    pub fn new(hour: u32, step: f32) -> Self {
        Self {
            time: NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN),
            step,
        }
    }

    pub fn set_hour(&mut self, hour: u32) {
        if let Some(time) = NaiveTime::from_hms_opt(hour % 24, 0, 0) {
            self.time = time;
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> NaiveTime {
        self.time
    }

    fn delta(&mut self) -> f32 {
        let millis = (self.step * 1000.0).round() as i64;
        self.time += chrono::Duration::milliseconds(millis);
        self.step
    }
}
