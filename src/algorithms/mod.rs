//! Rate limiting algorithms module
//!
//! The HTTP layer talks to limiters only through [`RateLimitAlgorithm`], so
//! the token bucket and the sliding window are interchangeable at startup.

pub mod sliding_window;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use crate::rate_limiter::TokenBucketLimiter;
pub use sliding_window::SlidingWindowLimiter;

use crate::config::Config;
use crate::error::ThrottleResult;

/// Which algorithm backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmKind {
    #[default]
    TokenBucket,
    SlidingWindow,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::TokenBucket => "token-bucket",
            AlgorithmKind::SlidingWindow => "sliding-window",
        }
    }
}

/// Outcome of one admission attempt. `remaining` and `retry_after` are read
/// under the same lock as the decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u64,
    pub retry_after: Duration,
}

/// Per-key admission control. Every method is infallible and safe to call
/// from many tasks at once.
pub trait RateLimitAlgorithm: Send + Sync {
    /// Consume one permit for `key` if one is available.
    fn allow(&self, key: &str) -> bool;

    /// Like [`allow`](Self::allow), also reporting the key's state right
    /// after the decision.
    fn check(&self, key: &str) -> Decision;

    /// Permits `key` could use right now, without consuming any.
    fn remaining_tokens(&self, key: &str) -> u64;

    /// How long until `key` gets a permit. Zero when one is available now.
    fn next_available(&self, key: &str) -> Duration;

    /// Drop state of keys idle past the eviction threshold. Returns how many
    /// keys were removed.
    fn evict_idle(&self) -> usize;

    /// Number of keys currently holding state.
    fn tracked_keys(&self) -> usize;

    /// Largest number of permits a key can hold.
    fn limit(&self) -> u64;

    fn kind(&self) -> AlgorithmKind;
}

/// Build the limiter selected by `config`.
pub fn build_limiter(config: &Config) -> ThrottleResult<Arc<dyn RateLimitAlgorithm>> {
    let limiter: Arc<dyn RateLimitAlgorithm> = match config.algorithm {
        AlgorithmKind::TokenBucket => Arc::new(TokenBucketLimiter::new(config.limiter_settings()?)),
        AlgorithmKind::SlidingWindow => {
            Arc::new(SlidingWindowLimiter::new(config.window_settings()?))
        }
    };
    Ok(limiter)
}
