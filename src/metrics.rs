use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters of gate decisions since `since` (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleMetrics {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub throttled_requests: u64,
    pub since: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    allowed: AtomicU64,
    throttled: AtomicU64,
    since: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            allowed: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            since: unix_now(),
        }
    }

    pub fn record_request(&self, allowed: bool) {
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ThrottleMetrics {
        let allowed_requests = self.allowed.load(Ordering::Relaxed);
        let throttled_requests = self.throttled.load(Ordering::Relaxed);
        ThrottleMetrics {
            total_requests: allowed_requests + throttled_requests,
            allowed_requests,
            throttled_requests,
            since: self.since,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
