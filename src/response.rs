use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::metrics::ThrottleMetrics;

/// Result of a keyed decision on `POST /rate-limit/:key/check`.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub key: String,
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl CheckResponse {
    pub fn allowed(key: String, remaining: u64, limit: u64) -> Self {
        Self {
            key,
            allowed: true,
            remaining,
            limit,
            retry_after_ms: None,
        }
    }

    pub fn denied(key: String, limit: u64, retry_after: Duration) -> Self {
        Self {
            key,
            allowed: false,
            remaining: 0,
            limit,
            retry_after_ms: Some(duration_ms(retry_after)),
        }
    }
}

/// Read-only view of a key on `GET /rate-limit/:key`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub key: String,
    pub remaining: u64,
    pub limit: u64,
    pub retry_after_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub algorithm: &'static str,
    pub tracked_keys: usize,
}

impl HealthResponse {
    pub fn healthy(uptime: Duration, algorithm: &'static str, tracked_keys: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime.as_secs(),
            algorithm,
            tracked_keys,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub enabled: bool,
    pub algorithm: &'static str,
    pub limit: u64,
    pub tracked_keys: usize,
    #[serde(flatten)]
    pub metrics: ThrottleMetrics,
}

pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
