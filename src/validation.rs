use crate::error::ThrottleError;

/// Longest key accepted on the HTTP API.
pub const MAX_KEY_LEN: usize = 256;

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Validates a limiter key taken from a request path.
    ///
    /// The limiter itself accepts any string; this only keeps junk out of
    /// the shared map when keys come from untrusted callers.
    pub fn validate_key(key: &str) -> Result<(), ThrottleError> {
        if key.trim().is_empty() {
            return Err(ThrottleError::Validation(
                "Rate limit key cannot be empty".to_string(),
            ));
        }

        if key.len() > MAX_KEY_LEN {
            return Err(ThrottleError::Validation(format!(
                "Rate limit key cannot exceed {} bytes",
                MAX_KEY_LEN
            )));
        }

        if key.chars().any(char::is_control) {
            return Err(ThrottleError::Validation(
                "Rate limit key contains control characters".to_string(),
            ));
        }

        Ok(())
    }
}
