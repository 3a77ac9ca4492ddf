use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;
use tracing::debug;
use tracing::trace;

use crate::ConfigError;
use crate::Strategy;
use crate::duration_to_nanos;

/// A simple window-based limiter.
///
/// Counts admitted requests in a single window. The first window opens at
/// construction. When more than `interval` has elapsed since the window opened,
/// the next request discards the count and opens a new window at its own arrival
/// time.
///
/// This is the naive baseline: because the reset is abrupt, up to
/// `2 * threshold` requests can be admitted within less than one `interval` if a
/// burst straddles a rollover. Use [`SlidingWindow`](crate::SlidingWindow) where
/// that matters.
#[derive(Debug)]
pub struct FixedWindow {
    threshold: usize,
    interval: Duration,
    interval_ns: u64,
    state: Mutex<WindowState>,
    clock: Clock,
    anchor: Instant,
}

#[derive(Debug)]
struct WindowState {
    /// Nanoseconds from anchor at which the current window began
    window_start: u64,
    /// Requests admitted in the current window
    count: usize,
}

impl Strategy for FixedWindow {
    fn allow(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.now();

        if now.saturating_sub(state.window_start) > self.interval_ns {
            trace!(
                discarded = state.count,
                window_start = state.window_start,
                now,
                "fixed window rolled over"
            );
            state.count = 0;
            state.window_start = now;
        }

        if state.count < self.threshold {
            state.count += 1;
            true
        } else {
            trace!(threshold = self.threshold, "fixed window rejected request");
            false
        }
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The maximum number of requests admitted within a single window.
    /// * `interval` - The duration of one window.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `threshold` or `interval` is zero.
    pub fn new(threshold: usize, interval: Duration) -> Result<Self, ConfigError> {
        Self::with_clock(threshold, interval, Clock::new())
    }

    /// Creates a new `FixedWindow` reading time from the supplied clock.
    pub fn with_clock(
        threshold: usize,
        interval: Duration,
        clock: Clock,
    ) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        let interval_ns = duration_to_nanos(interval)?;
        if interval_ns == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        debug!(threshold, ?interval, "created fixed window limiter");
        Ok(Self::from_parts(threshold, interval, interval_ns, clock))
    }

    fn from_parts(threshold: usize, interval: Duration, interval_ns: u64, clock: Clock) -> Self {
        let anchor = clock.now();
        Self {
            threshold,
            interval,
            interval_ns,
            state: Mutex::new(WindowState {
                window_start: 0,
                count: 0,
            }),
            clock,
            anchor,
        }
    }

    /// The maximum number of requests admitted per window.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The length of one window.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How many more requests would be admitted right now.
    ///
    /// Does not consume quota or roll the window over.
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        let now = self.now();
        if now.saturating_sub(state.window_start) > self.interval_ns {
            self.threshold
        } else {
            self.threshold - state.count
        }
    }

    fn now(&self) -> u64 {
        self.clock.now().duration_since(self.anchor).as_nanos() as u64
    }
}

impl Default for FixedWindow {
    /// Three requests per second.
    fn default() -> Self {
        let interval = Duration::from_secs(1);
        Self::from_parts(3, interval, interval.as_nanos() as u64, Clock::new())
    }
}
