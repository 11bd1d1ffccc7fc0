use clap::{ArgAction, Parser};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::algorithms::AlgorithmKind;
use crate::config_validator::ConfigValidator;
use crate::error::ThrottleResult;
use crate::rate_limit_config::{LimiterSettings, WindowSettings};

#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "linkthrottle", version, about = "Per-client rate limiting gateway")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Turn the request gate on or off
    #[arg(long, env = "RATE_LIMIT_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub enabled: bool,

    /// Limiting algorithm
    #[arg(long, env = "RATE_LIMIT_ALGORITHM", value_enum, default_value_t = AlgorithmKind::TokenBucket)]
    pub algorithm: AlgorithmKind,

    /// Tokens added per refill interval
    #[arg(long, env = "RATE_LIMIT_RATE", default_value_t = 1)]
    pub rate: u64,

    /// Refill interval, e.g. "1s" or "500ms"
    #[arg(long, env = "RATE_LIMIT_INTERVAL", default_value = "1s", value_parser = humantime::parse_duration)]
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Token bucket capacity
    #[arg(long, env = "RATE_LIMIT_MAX_TOKENS", default_value_t = 60)]
    pub max_tokens: u64,

    /// Sliding window length
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value = "1m", value_parser = humantime::parse_duration)]
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Requests admitted per sliding window
    #[arg(long, env = "RATE_LIMIT_WINDOW_REQUESTS", default_value_t = 60)]
    pub window_requests: u64,

    /// Drop state of clients idle for longer than this
    #[arg(long, env = "RATE_LIMIT_IDLE_EVICTION", default_value = "1h", value_parser = humantime::parse_duration)]
    #[serde(with = "humantime_serde")]
    pub idle_eviction: Duration,

    /// How often idle state is swept
    #[arg(long, env = "RATE_LIMIT_CLEANUP_INTERVAL", default_value = "10m", value_parser = humantime::parse_duration)]
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Take the client address from X-Forwarded-For / X-Real-IP
    #[arg(long, env = "TRUST_FORWARDED_HEADERS", default_value_t = false, action = ArgAction::Set)]
    pub trust_forwarded_headers: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let limiter = LimiterSettings::default();
        let window = WindowSettings::default();
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            enabled: true,
            algorithm: AlgorithmKind::TokenBucket,
            rate: limiter.rate,
            interval: limiter.interval,
            max_tokens: limiter.max_tokens,
            window: window.window,
            window_requests: window.max_requests,
            idle_eviction: limiter.idle_eviction,
            cleanup_interval: Duration::from_secs(10 * 60),
            trust_forwarded_headers: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse command line arguments, falling back to environment variables.
    pub fn from_env() -> Self {
        Config::parse()
    }

    pub fn limiter_settings(&self) -> ThrottleResult<LimiterSettings> {
        LimiterSettings::new(self.rate, self.interval, self.max_tokens, self.idle_eviction)
    }

    pub fn window_settings(&self) -> ThrottleResult<WindowSettings> {
        WindowSettings::new(self.window_requests, self.window, self.idle_eviction)
    }

    /// Check every setting the server depends on.
    pub fn validate(&self) -> ThrottleResult<()> {
        ConfigValidator::validate_log_level(&self.log_level)?;
        ConfigValidator::validate_cleanup_interval(self.cleanup_interval)?;
        match self.algorithm {
            AlgorithmKind::TokenBucket => self.limiter_settings().map(|_| ()),
            AlgorithmKind::SlidingWindow => self.window_settings().map(|_| ()),
        }
    }
}
