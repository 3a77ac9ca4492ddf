use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tokio::time::Instant;
use tokio::time::Sleep;
use tokio::time::Timeout;
use tokio::time::sleep;
use tokio::time::timeout;
use tower::BoxError;
use tower::Service;
use tracing::trace;

use window_limit::Strategy;

use crate::error::WindowError;

#[derive(Clone, Debug)]
struct RateLimitServiceMetrics {
    rejected: Counter<u64>,
}

/// Admits requests to the inner service only when the strategy allows them.
///
/// Every request asks the strategy exactly once per attempt, in `poll_ready`.
/// A rejection fails the request with [`WindowError::RateLimited`] unless a retry
/// interval is configured, in which case the service sleeps and asks again.
#[derive(Debug)]
pub struct RateLimitService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    pub(crate) strategy: &'static str,
    sleep: Option<Pin<Box<Sleep>>>,
    permit_acquired: bool,
    retry_interval: Option<Duration>,
    timeout: Option<Duration>,
    wait_start: Option<Instant>,
    instruments: RateLimitServiceMetrics,
}

pin_project! {
    /// A future that wraps the inner service future with a timeout.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: Timeout<F>,
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.inner.poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(_)) => Poll::Ready(Err(E::from(Box::new(WindowError::Timeout)))),
            Poll::Pending => Poll::Pending,
        }
    }
}

// Manually implement Clone because Pin<Box<Sleep>> cannot be cloned
impl<L, S> Clone for RateLimitService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            strategy: self.strategy,
            // Clones share the quota, not the wait state
            sleep: None,
            permit_acquired: false,
            retry_interval: self.retry_interval,
            timeout: self.timeout,
            wait_start: None,
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, Req> Service<Req> for RateLimitService<L, S>
where
    L: Strategy + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // 1. If we are backing off after a rejection, wait for the retry
        if let Some(ref mut fut) = self.sleep {
            match fut.as_mut().poll(cx) {
                Poll::Ready(_) => {
                    self.sleep = None;
                    if self.wait_expired() {
                        return Poll::Ready(Err(Box::new(WindowError::Timeout)));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        // 2. Check inner service readiness FIRST to avoid consuming quota
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        // 3. Ask the strategy if we don't have a permit yet
        if !self.permit_acquired {
            if self.limiter.allow() {
                self.permit_acquired = true;
                return Poll::Ready(Ok(()));
            }

            self.instruments
                .rejected
                .add(1, &[KeyValue::new("strategy", self.strategy)]);

            let Some(retry_interval) = self.retry_interval else {
                trace!(strategy = self.strategy, "request rejected");
                self.wait_start = None;
                return Poll::Ready(Err(Box::new(WindowError::RateLimited)));
            };

            let start = *self.wait_start.get_or_insert_with(Instant::now);
            let sleep_duration = match self.timeout {
                Some(timeout) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        self.wait_start = None;
                        return Poll::Ready(Err(Box::new(WindowError::Timeout)));
                    }
                    retry_interval.min(remaining)
                }
                None => retry_interval,
            };

            trace!(strategy = self.strategy, ?sleep_duration, "request waiting for admission");
            let mut sleep_fut = Box::pin(sleep(sleep_duration));
            match sleep_fut.as_mut().poll(cx) {
                Poll::Pending => {
                    self.sleep = Some(sleep_fut);
                }
                Poll::Ready(_) => {
                    // Immediate wakeup (zero interval); try again on the next poll
                    if self.wait_expired() {
                        return Poll::Ready(Err(Box::new(WindowError::Timeout)));
                    }
                    cx.waker().wake_by_ref();
                }
            }
            return Poll::Pending;
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.permit_acquired = false;
        let start = self.wait_start.take();
        let timeout_duration = match (self.timeout, start) {
            (Some(t), Some(s)) => t.saturating_sub(s.elapsed()),
            (Some(t), None) => t,
            (None, _) => Duration::from_secs(3600 * 24 * 365), // Effective infinity
        };

        ResponseFuture {
            inner: timeout(timeout_duration, self.inner.call(req)),
        }
    }
}

impl<L, S> RateLimitService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let meter = global::meter("rate_limit_service");
        let instruments = RateLimitServiceMetrics {
            rejected: meter.u64_counter("rejected").build(),
        };

        Self {
            inner,
            limiter,
            strategy: std::any::type_name::<L>(),
            sleep: None,
            permit_acquired: false,
            retry_interval: None,
            timeout: None,
            wait_start: None,
            instruments,
        }
    }

    /// Wait this long after a rejection and ask the strategy again, instead of
    /// failing with [`WindowError::RateLimited`].
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = Some(retry_interval);
        self
    }

    /// Bound the total time spent waiting for admission and running the request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn wait_expired(&mut self) -> bool {
        if let Some(timeout) = self.timeout
            && let Some(start) = self.wait_start
            && start.elapsed() >= timeout
        {
            self.wait_start = None;
            return true;
        }
        false
    }
}
