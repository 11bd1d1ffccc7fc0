use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ThrottleError, ThrottleResult};

/// Parameters of a token bucket limiter. Immutable once the limiter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Tokens granted per elapsed `interval`.
    pub rate: u64,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Bucket capacity, also the burst size of a fresh key.
    pub max_tokens: u64,
    /// Buckets untouched for longer than this are reclaimed.
    #[serde(with = "humantime_serde")]
    pub idle_eviction: Duration,
}

/// Parameters of the sliding window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub max_requests: u64,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_eviction: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            rate: 1,
            interval: Duration::from_secs(1),
            max_tokens: 60,
            idle_eviction: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            idle_eviction: Duration::from_secs(60 * 60),
        }
    }
}

impl LimiterSettings {
    /// Build validated settings.
    pub fn new(
        rate: u64,
        interval: Duration,
        max_tokens: u64,
        idle_eviction: Duration,
    ) -> ThrottleResult<Self> {
        let settings = Self {
            rate,
            interval,
            max_tokens,
            idle_eviction,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ThrottleResult<()> {
        if self.rate == 0 {
            return Err(ThrottleError::Config(
                "Refill rate must be greater than 0".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(ThrottleError::Config(
                "Refill interval must be greater than 0".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ThrottleError::Config(
                "Bucket capacity must be greater than 0".to_string(),
            ));
        }
        if self.idle_eviction.is_zero() {
            return Err(ThrottleError::Config(
                "Idle eviction threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl WindowSettings {
    pub fn new(max_requests: u64, window: Duration, idle_eviction: Duration) -> ThrottleResult<Self> {
        let settings = Self {
            max_requests,
            window,
            idle_eviction,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ThrottleResult<()> {
        if self.max_requests == 0 {
            return Err(ThrottleError::Config(
                "Requests per window must be greater than 0".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ThrottleError::Config(
                "Window size must be greater than 0".to_string(),
            ));
        }
        if self.idle_eviction.is_zero() {
            return Err(ThrottleError::Config(
                "Idle eviction threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(LimiterSettings::default().validate().is_ok());
        assert!(WindowSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let hour = Duration::from_secs(3600);
        assert!(LimiterSettings::new(0, Duration::from_secs(1), 5, hour).is_err());
        assert!(LimiterSettings::new(1, Duration::ZERO, 5, hour).is_err());
        assert!(LimiterSettings::new(1, Duration::from_secs(1), 0, hour).is_err());
        assert!(LimiterSettings::new(1, Duration::from_secs(1), 5, Duration::ZERO).is_err());
        assert!(WindowSettings::new(0, Duration::from_secs(60), hour).is_err());
        assert!(WindowSettings::new(10, Duration::ZERO, hour).is_err());
    }

    #[test]
    fn test_settings_serialize_durations_readably() {
        let settings = LimiterSettings::new(2, Duration::from_secs(1), 5, Duration::from_secs(3600))
            .unwrap();
        let json = serde_json::to_value(settings).unwrap();
        assert_eq!(json["interval"], "1s");
        assert_eq!(json["idle_eviction"], "1h");
        assert_eq!(json["max_tokens"], 5);
    }
}
