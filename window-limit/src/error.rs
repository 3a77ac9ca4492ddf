/// Errors produced when a limiter is constructed with parameters that cannot
/// yield meaningful admission decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The threshold was zero, so no request could ever be admitted.
    #[error("threshold must be greater than zero")]
    ZeroThreshold,

    /// A window or sub-window interval was zero.
    #[error("window interval must be greater than zero")]
    ZeroInterval,

    /// A sliding window was configured with no sub-windows.
    #[error("sub-window count must be greater than zero")]
    ZeroSubWindows,

    /// The interval, or the span it covers, does not fit in 64 bits of nanoseconds.
    #[error("window interval is too large")]
    IntervalOverflow,
}
