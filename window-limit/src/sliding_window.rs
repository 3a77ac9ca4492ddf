use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;
use tracing::debug;
use tracing::trace;

use crate::ConfigError;
use crate::Strategy;
use crate::duration_to_nanos;

/// A Sliding Window Counter implementation.
///
/// Time is cut into sub-windows of `sub_window_interval`. The limiter keeps a
/// count per sub-window for the most recent `sub_window_count` of them and admits
/// a request only while their sum is below the threshold. The more sub-windows,
/// the closer this tracks a true sliding window of length
/// `sub_window_count * sub_window_interval`.
///
/// Expired sub-windows are dropped lazily on every decision, so memory is bounded
/// by `sub_window_count` entries.
///
/// Time is read from a monotonic clock; the algorithm assumes time never goes
/// backwards.
#[derive(Debug)]
pub struct SlidingWindow {
    threshold: usize,
    sub_window_count: usize,
    sub_window_interval: Duration,
    sub_window_ns: u64,
    /// Distance from the current sub-window to the oldest one still counted
    lookback_ns: u64,
    /// Sub-window start (nanos from anchor) -> admitted requests
    buckets: Mutex<BTreeMap<u64, usize>>,
    clock: Clock,
    anchor: Instant,
}

impl Strategy for SlidingWindow {
    fn allow(&self) -> bool {
        let mut buckets = self.buckets.lock();
        let current = self.current_bucket();
        let oldest = current.saturating_sub(self.lookback_ns);

        if buckets
            .first_key_value()
            .is_some_and(|(&start, _)| start < oldest)
        {
            let live = buckets.split_off(&oldest);
            let evicted = std::mem::replace(&mut *buckets, live);
            trace!(evicted = evicted.len(), oldest, "sliding window evicted buckets");
        }

        let total: usize = buckets.values().sum();
        if total >= self.threshold {
            trace!(total, threshold = self.threshold, "sliding window rejected request");
            return false;
        }

        *buckets.entry(current).or_insert(0) += 1;
        true
    }
}

impl SlidingWindow {
    /// Creates a new `SlidingWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The maximum number of requests admitted across the whole span.
    /// * `sub_window_count` - How many sub-windows make up the span.
    /// * `sub_window_interval` - The duration of one sub-window.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any argument is zero, or if the span does not
    /// fit in 64 bits of nanoseconds.
    pub fn new(
        threshold: usize,
        sub_window_count: usize,
        sub_window_interval: Duration,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(threshold, sub_window_count, sub_window_interval, Clock::new())
    }

    /// Creates a new `SlidingWindow` reading time from the supplied clock.
    pub fn with_clock(
        threshold: usize,
        sub_window_count: usize,
        sub_window_interval: Duration,
        clock: Clock,
    ) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if sub_window_count == 0 {
            return Err(ConfigError::ZeroSubWindows);
        }
        let sub_window_ns = duration_to_nanos(sub_window_interval)?;
        if sub_window_ns == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        // The full span must be representable too.
        sub_window_ns
            .checked_mul(sub_window_count as u64)
            .ok_or(ConfigError::IntervalOverflow)?;

        debug!(
            threshold,
            sub_window_count,
            ?sub_window_interval,
            "created sliding window limiter"
        );
        Ok(Self::from_parts(
            threshold,
            sub_window_count,
            sub_window_interval,
            sub_window_ns,
            clock,
        ))
    }

    fn from_parts(
        threshold: usize,
        sub_window_count: usize,
        sub_window_interval: Duration,
        sub_window_ns: u64,
        clock: Clock,
    ) -> Self {
        let anchor = clock.now();
        Self {
            threshold,
            sub_window_count,
            sub_window_interval,
            sub_window_ns,
            lookback_ns: sub_window_ns * (sub_window_count as u64 - 1),
            buckets: Mutex::new(BTreeMap::new()),
            clock,
            anchor,
        }
    }

    /// The maximum number of requests admitted across the span.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The number of sub-windows retained.
    pub fn sub_window_count(&self) -> usize {
        self.sub_window_count
    }

    /// The length of one sub-window.
    pub fn sub_window_interval(&self) -> Duration {
        self.sub_window_interval
    }

    /// The effective sliding window length.
    pub fn span(&self) -> Duration {
        Duration::from_nanos(self.sub_window_ns * self.sub_window_count as u64)
    }

    /// How many more requests would be admitted right now.
    ///
    /// Expired sub-windows are ignored but not evicted.
    pub fn remaining(&self) -> usize {
        let buckets = self.buckets.lock();
        let oldest = self.current_bucket().saturating_sub(self.lookback_ns);
        let total: usize = buckets.range(oldest..).map(|(_, count)| count).sum();
        self.threshold.saturating_sub(total)
    }

    fn current_bucket(&self) -> u64 {
        let now = self.clock.now().duration_since(self.anchor).as_nanos() as u64;
        now - now % self.sub_window_ns
    }

    #[cfg(test)]
    fn bucket_keys(&self) -> Vec<u64> {
        self.buckets.lock().keys().copied().collect()
    }
}

impl Default for SlidingWindow {
    /// Three requests over ten sub-windows of 100ms.
    fn default() -> Self {
        let sub_window_interval = Duration::from_millis(100);
        Self::from_parts(
            3,
            10,
            sub_window_interval,
            sub_window_interval.as_nanos() as u64,
            Clock::new(),
        )
    }
}
