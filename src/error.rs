use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Body sent to clients that hit the limit.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ThrottleResult<T> = Result<T, ThrottleError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            error: error.into(),
            code: Some(code),
        }
    }

    fn rate_limited() -> Self {
        Self {
            error: RATE_LIMIT_MESSAGE.to_string(),
            code: None,
        }
    }
}

impl ThrottleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ThrottleError::Config(_) | ThrottleError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ThrottleError::Validation(_) => StatusCode::BAD_REQUEST,
            ThrottleError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Whole seconds a client should wait, never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ThrottleError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ThrottleError::RateLimitExceeded { retry_after } => {
                let mut response = (status, Json(ErrorResponse::rate_limited())).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs(retry_after)),
                );
                response
            }
            ThrottleError::Validation(msg) => {
                (status, Json(ErrorResponse::new(msg, "validation_error"))).into_response()
            }
            other => {
                tracing::error!(target: "linkthrottle::error", error = %other, "Request failed");
                (status, Json(ErrorResponse::new(other.to_string(), "internal_error")))
                    .into_response()
            }
        }
    }
}
