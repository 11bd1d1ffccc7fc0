use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ThrottleError;
use crate::handlers::AppState;

const REQUEST_ID: &str = "x-request-id";
const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Logging middleware for request/response tracking
pub async fn logging_middleware(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID, value);
    }

    info!(
        target: "linkthrottle::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    let status = response.status();
    info!(
        target: "linkthrottle::middleware",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

/// Admission gate: one `check` per inbound request, keyed by client address.
/// Denied requests get a 429 and never reach the wrapped handlers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ThrottleError> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let key = state.key_generator.generate_key(&request);
    let decision = state.limiter.check(&key);
    state.metrics.record_request(decision.allowed);

    if !decision.allowed {
        let retry_after = decision.retry_after;
        warn!(
            target: "linkthrottle::middleware",
            key = %key,
            uri = %request.uri(),
            retry_after = ?retry_after,
            "Rate limit exceeded"
        );
        return Err(ThrottleError::RateLimitExceeded { retry_after });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(state.limiter.limit()));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));

    Ok(response)
}
