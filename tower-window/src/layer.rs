use std::sync::Arc;
use std::time::Duration;

use tower::Layer;
use window_limit::Strategy;

use crate::service::RateLimitService;

/// Gates requests on a shared [`Strategy`].
///
/// Every service produced by this layer (and every clone of those services)
/// draws from the same limiter, so they share one quota.
#[derive(Debug)]
pub struct RateLimitLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    retry_interval: Option<Duration>,
    timeout: Option<Duration>,
}

impl<L> Clone for RateLimitLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            retry_interval: self.retry_interval,
            timeout: self.timeout,
        }
    }
}

impl<L> RateLimitLayer<L>
where
    L: Strategy + ?Sized,
{
    /// Create a RateLimitLayer that rejects immediately when the strategy says no.
    pub fn new(limiter: Arc<L>) -> Self {
        RateLimitLayer {
            limiter,
            retry_interval: None,
            timeout: None,
        }
    }

    /// Instead of failing with `WindowError::RateLimited`, wait `retry_interval`
    /// and ask the strategy again.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = Some(retry_interval);
        self
    }

    /// Set a unified timeout for both waiting for admission and request execution.
    ///
    /// If the total time exceeds this duration, the service
    /// will return `WindowError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<L, S> Layer<S> for RateLimitLayer<L>
where
    L: ?Sized,
{
    type Service = RateLimitService<L, S>;

    fn layer(&self, service: S) -> Self::Service {
        let mut svc = RateLimitService::new(service, self.limiter.clone());
        if let Some(retry_interval) = self.retry_interval {
            svc = svc.with_retry_interval(retry_interval);
        }
        if let Some(timeout) = self.timeout {
            svc = svc.with_timeout(timeout);
        }
        svc
    }
}
