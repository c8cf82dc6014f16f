/// Errors produced by the throttling middleware.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaceError {
    /// The request was rejected because a quota window is full.
    ///
    /// The duration indicates when the client should retry. Only produced
    /// in fail-fast mode; a queued service waits instead.
    /// When the `axum` feature is enabled, this converts to
    /// `429 Too Many Requests` with a `Retry-After` header.
    #[error("admission refused; retry after {retry_after:?}")]
    RateLimited {
        /// The duration to wait before retrying.
        retry_after: std::time::Duration,
    },

    /// The request waited for admission longer than the configured limit.
    ///
    /// When the `axum` feature is enabled, this converts to
    /// `408 Request Timeout`.
    #[error("request exceeded its admission wait limit")]
    WaitLimitExceeded,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for PaceError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, msg, headers) = match self {
            Self::WaitLimitExceeded => (StatusCode::REQUEST_TIMEOUT, self.to_string(), None),
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                let val = axum::http::HeaderValue::from(secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    self.to_string(),
                    Some((axum::http::header::RETRY_AFTER, val)),
                )
            }
        };

        let mut response = (status, msg).into_response();
        if let Some((name, value)) = headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}
