//! Poll-driven interval timers.
//!
//! The extension is single threaded: instead of callbacks, the owner asks a
//! timer whether it is due each time the host loop ticks. Clearing a timer is
//! dropping it.

use super::time_source::SharedTimeSource;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct IntervalTimer {
    interval: Duration,
    next_due: Instant,
    time_source: SharedTimeSource,
}

impl IntervalTimer {
    /// Start a timer whose first firing is one interval from now.
    pub fn start(interval: Duration, time_source: SharedTimeSource) -> Self {
        let next_due = time_source.now() + interval;
        Self {
            interval,
            next_due,
            time_source,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true at most once per elapsed interval.
    ///
    /// A late poll fires once and re-arms from the current instant rather
    /// than replaying every missed interval.
    pub fn poll(&mut self) -> bool {
        let now = self.time_source.now();
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}
