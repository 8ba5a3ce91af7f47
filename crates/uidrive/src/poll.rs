//! Bounded-backoff polling for conditions that have no notification source.

use std::{
    thread,
    time::{Duration, Instant},
};

/// First delay between checks.
const MIN_DELAY: Duration = Duration::from_millis(1);
/// Ceiling for the delay between checks.
const MAX_DELAY: Duration = Duration::from_millis(10);

/// Exponential backoff between two bounds.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Next delay to use.
    next: Duration,
    /// Ceiling for the delay.
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(MIN_DELAY, MAX_DELAY)
    }
}

impl Backoff {
    /// Construct a backoff that starts at `min` and doubles up to `max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            next: min.min(max),
            max,
        }
    }

    /// Return the current delay and advance to the next.
    pub fn step(&mut self) -> Duration {
        let d = self.next;
        self.next = (self.next * 2).min(self.max);
        d
    }
}

/// Check `condition` until it holds or `timeout` elapses. The condition is
/// always checked at least once, and once more at the deadline. Returns
/// whether the condition was observed to hold.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    let mut backoff = Backoff::default();
    loop {
        if condition() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(backoff.step().min(deadline - now));
    }
}
