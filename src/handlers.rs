use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use crate::algorithms::RateLimitAlgorithm;
use crate::error::{retry_after_secs, ThrottleError};
use crate::key_generator::KeyGenerator;
use crate::metrics::MetricsCollector;
use crate::response::{duration_ms, CheckResponse, HealthResponse, StatsResponse, StatusResponse};
use crate::validation::RequestValidator;

/// Shared application state. Cheap to clone; everything heavy is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimitAlgorithm>,
    pub metrics: Arc<MetricsCollector>,
    pub key_generator: KeyGenerator,
    pub enabled: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(limiter: Arc<dyn RateLimitAlgorithm>, key_generator: KeyGenerator, enabled: bool) -> Self {
        Self {
            limiter,
            metrics: Arc::new(MetricsCollector::new()),
            key_generator,
            enabled,
            started_at: Instant::now(),
        }
    }
}

/// Consume one token for `key` and report the decision.
///
/// Path keys live in their own namespace, so they never touch the buckets
/// the request gate keeps for client addresses.
pub async fn check_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ThrottleError> {
    RequestValidator::validate_key(&key)?;

    let limit = state.limiter.limit();
    let decision = state.limiter.check(&KeyGenerator::api_key(&key));
    if decision.allowed {
        let remaining = decision.remaining;
        tracing::debug!(target: "linkthrottle::handlers", key = %key, remaining, "Check allowed");
        return Ok(Json(CheckResponse::allowed(key, remaining, limit)).into_response());
    }

    let retry_after = decision.retry_after;
    tracing::debug!(target: "linkthrottle::handlers", key = %key, retry_after = ?retry_after, "Check denied");

    let mut resp = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(CheckResponse::denied(key, limit, retry_after)),
    )
        .into_response();
    resp.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(retry_after_secs(retry_after)),
    );
    Ok(resp)
}

/// Current state of `key` without consuming anything.
pub async fn get_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StatusResponse>, ThrottleError> {
    RequestValidator::validate_key(&key)?;

    let limiter_key = KeyGenerator::api_key(&key);
    let remaining = state.limiter.remaining_tokens(&limiter_key);
    let retry_after = state.limiter.next_available(&limiter_key);

    Ok(Json(StatusResponse {
        key,
        remaining,
        limit: state.limiter.limit(),
        retry_after_ms: duration_ms(retry_after),
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(
        state.started_at.elapsed(),
        state.limiter.kind().as_str(),
        state.limiter.tracked_keys(),
    ))
}

/// Gate counters and limiter occupancy.
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        enabled: state.enabled,
        algorithm: state.limiter.kind().as_str(),
        limit: state.limiter.limit(),
        tracked_keys: state.limiter.tracked_keys(),
        metrics: state.metrics.snapshot(),
    })
}
