//! # window-limit
//!
//! `window-limit` provides window-based admission control: a limiter answers
//! "admit or reject" for the current instant so that a protected resource never
//! sees more than a configured number of operations per unit of time.
//!
//! ## Strategies
//!
//! * [`FixedWindow`]: counts requests in one window that resets abruptly when it
//!   expires. Cheap, but a burst straddling a rollover can admit up to twice the
//!   threshold in less than one interval. Kept as the naive baseline.
//! * [`SlidingWindow`]: keeps a rolling set of small sub-windows and sums them,
//!   so the effective window slides with time and the boundary burst goes away.
//!
//! Both implement [`Strategy`], so callers can swap one for the other without
//! touching call sites.
//!
//! ## Concurrency
//!
//! Every decision (read the clock, expire old state, compare against the
//! threshold, record the admission) runs under a single lock per limiter
//! instance. Sharing one limiter across threads through an `Arc` never
//! overshoots the threshold.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use window_limit::SlidingWindow;
//! use window_limit::Strategy;
//!
//! let limiter = SlidingWindow::new(100, 10, Duration::from_millis(100))?;
//!
//! if limiter.allow() {
//!     // Request admitted
//! }
//! # Ok::<(), window_limit::ConfigError>(())
//! ```

use std::fmt::Debug;

mod error;
mod fixed_window;
mod sliding_window;

pub use error::ConfigError;
pub use fixed_window::FixedWindow;
pub use sliding_window::SlidingWindow;

/// The core trait for all admission strategies.
///
/// Implementations are `Send` and `Sync` so they can be shared across thread
/// boundaries via `Arc`.
pub trait Strategy: Debug {
    /// Decides whether a single request arriving now is admitted.
    ///
    /// Returns `true` if the request fits in the quota (and records it),
    /// `false` if it must be rejected. Never blocks and never fails.
    fn allow(&self) -> bool;
}

/// Converts a duration into whole nanoseconds, failing if it does not fit a `u64`.
pub(crate) fn duration_to_nanos(duration: std::time::Duration) -> Result<u64, ConfigError> {
    u64::try_from(duration.as_nanos()).map_err(|_| ConfigError::IntervalOverflow)
}
