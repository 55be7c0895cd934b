//! Clocks, deadlines and timers
//!
//! Polling loops (lock wait, program detection, discovery rounds) are
//! written against the [`Clock`] trait so they can run on a simulated clock
//! in tests.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Source of time and sleeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when slept on
///
/// Sleeping advances the clock instantly, so multi-second polling loops
/// finish immediately while still observing their timeouts.
#[derive(Debug)]
pub struct SimulatedClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedClock {
    pub fn new() -> Self {
        SimulatedClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward without sleeping
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A point in time after which a wait gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(clock: &dyn Clock, timeout: Duration) -> Self {
        Deadline {
            at: clock.now() + timeout,
        }
    }

    /// Check if the deadline has passed
    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.at
    }

    /// Time left before the deadline (zero once expired)
    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.at.saturating_duration_since(clock.now())
    }

    /// Restart the deadline `timeout` from now
    pub fn reset(&mut self, clock: &dyn Clock, timeout: Duration) {
        self.at = clock.now() + timeout;
    }
}

/// Sleep at least `duration`
///
/// `std::thread::sleep` can return early on some platforms, so keep sleeping
/// until the full duration has passed.
pub fn sleep_minimum(clock: &dyn Clock, duration: Duration) {
    let deadline = Deadline::after(clock, duration);
    loop {
        let remaining = deadline.remaining(clock);
        if remaining.is_zero() {
            return;
        }
        clock.sleep(remaining);
    }
}

/// Timer for periodic operations
///
/// Used for periodic statistics output.
pub struct Timer {
    interval: Duration,
    last_fire: Instant,
}

impl Timer {
    /// Create a new timer with the given interval
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            last_fire: Instant::now(),
        }
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.last_fire.elapsed() >= self.interval
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.last_fire = Instant::now();
    }

    /// Check and reset if expired
    ///
    /// Returns true if the timer was expired (and has now been reset).
    pub fn check_and_reset(&mut self) -> bool {
        if self.expired() {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Get the timer interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
