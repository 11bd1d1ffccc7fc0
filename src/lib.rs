pub mod algorithms;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod key_generator;
pub mod metrics;
pub mod middleware;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod reaper;
pub mod response;
pub mod server;
pub mod token_bucket;
pub mod validation;

pub use algorithms::{AlgorithmKind, Decision, RateLimitAlgorithm, SlidingWindowLimiter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ThrottleError, ThrottleResult};
pub use rate_limit_config::{LimiterSettings, WindowSettings};
pub use rate_limiter::TokenBucketLimiter;
pub use reaper::Reaper;
pub use server::{create_app, with_rate_limit};
