use std::time::Duration;

use crate::error::ThrottleError;

/// Validates configuration values that the settings types do not cover.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the fallback log level
    pub fn validate_log_level(level: &str) -> Result<(), ThrottleError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(ThrottleError::Config(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                level, valid_levels
            )));
        }

        Ok(())
    }

    /// Validates the idle sweep period
    pub fn validate_cleanup_interval(period: Duration) -> Result<(), ThrottleError> {
        if period.is_zero() {
            return Err(ThrottleError::Config(
                "Cleanup interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
