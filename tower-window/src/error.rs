/// Errors produced by the window gate middleware.
///
/// Errors from the inner service are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// The strategy rejected the request.
    ///
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The request waited for admission, or for the inner service, longer than
    /// the configured timeout.
    ///
    /// When the `axum` feature is enabled, this converts to `408 Request Timeout`.
    #[error("Request timed out waiting for rate limit capacity")]
    Timeout,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for WindowError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
        };

        (status, self.to_string()).into_response()
    }
}
