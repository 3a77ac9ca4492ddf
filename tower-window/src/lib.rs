//! # Tower Window
//!
//! `tower-window` puts a [`window_limit::Strategy`] in front of a
//! [Tower](https://github.com/tower-rs/tower) service as an admission gate.
//!
//! Each request asks the strategy once, in `poll_ready`, before the inner
//! service does any work:
//!
//! 1. **Admitted**: the request is forwarded to the inner service.
//! 2. **Rejected**: by default the request fails immediately with
//!    [`WindowError::RateLimited`]. With a retry interval configured, the service
//!    instead sleeps and asks again, giving up with [`WindowError::Timeout`] once
//!    the configured timeout is spent.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`WindowError`], converting it to HTTP
//!   status codes (429, 408). Errors from the inner service pass through unchanged.

mod error;
mod layer;
mod service;


pub use error::WindowError;
pub use layer::RateLimitLayer;
pub use service::RateLimitService;
pub use service::ResponseFuture;
