//! Wall-clock sources used for real-time pacing.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::CancellationToken;

/// Longest single sleep while waiting, so cancellation is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(2);

/// A monotonic hardware-rate counter with a blocking wait.
///
/// Each machine instance paces against its own clock source; the wait state
/// is never shared between machines.
pub trait ClockSource {
    /// Current counter value.
    fn counter(&self) -> u64;

    /// Counter increments per second.
    fn frequency(&self) -> u64;

    /// Block until `counter() >= target` or the token is cancelled.
    fn wait_until(&self, target: u64, token: &CancellationToken);
}

/// Host clock backed by [`Instant`], counting nanoseconds.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn counter(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        1_000_000_000
    }

    fn wait_until(&self, target: u64, token: &CancellationToken) {
        let now = self.counter();
        if now >= target {
            log::trace!("clock already {} counts past wait target", now - target);
            return;
        }
        loop {
            if token.is_cancelled() {
                return;
            }
            let now = self.counter();
            if now >= target {
                return;
            }
            let remaining = Duration::from_nanos(target - now);
            std::thread::sleep(remaining.min(WAIT_SLICE));
        }
    }
}

/// Manually driven clock for tests and headless runs.
///
/// `wait_until` jumps straight to the target instead of sleeping, so a run
/// loop paced by this clock executes as fast as the host allows.
#[derive(Debug)]
pub struct VirtualClock {
    frequency: u64,
    now: Cell<u64>,
    waits: Cell<u32>,
}

impl VirtualClock {
    #[must_use]
    pub fn new(frequency: u64) -> Self {
        Self {
            frequency,
            now: Cell::new(0),
            waits: Cell::new(0),
        }
    }

    /// Move the counter forward by `counts`.
    pub fn advance(&self, counts: u64) {
        self.now.set(self.now.get() + counts);
    }

    /// Number of `wait_until` calls seen so far.
    #[must_use]
    pub fn waits(&self) -> u32 {
        self.waits.get()
    }
}

impl ClockSource for VirtualClock {
    fn counter(&self) -> u64 {
        self.now.get()
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }

    fn wait_until(&self, target: u64, token: &CancellationToken) {
        self.waits.set(self.waits.get() + 1);
        if token.is_cancelled() {
            return;
        }
        if target > self.now.get() {
            self.now.set(target);
        }
    }
}
