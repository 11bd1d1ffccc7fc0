//! Limiter key derivation.
//!
//! Gate keys and caller-chosen keys share one limiter, so each lives under
//! its own prefix and neither can name the other's buckets.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Prefix of keys derived from the client address.
pub const CLIENT_KEY_PREFIX: &str = "ip:";

/// Prefix of keys named on `/rate-limit/:key`.
pub const API_KEY_PREFIX: &str = "key:";

/// Derives the limiter key of an inbound request from its client address.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyGenerator {
    trust_forwarded_headers: bool,
}

impl KeyGenerator {
    pub fn new(trust_forwarded_headers: bool) -> Self {
        Self {
            trust_forwarded_headers,
        }
    }

    /// Limiter key for `request`, e.g. `ip:203.0.113.7`.
    pub fn generate_key(&self, request: &Request) -> String {
        format!("{}{}", CLIENT_KEY_PREFIX, self.client_ip(request))
    }

    /// Limiter key for a caller-chosen `key`, e.g. `key:ip:203.0.113.7`.
    pub fn api_key(key: &str) -> String {
        format!("{}{}", API_KEY_PREFIX, key)
    }

    /// Client address of `request`. Forwarding headers are consulted only
    /// when the service sits behind a trusted proxy.
    pub fn client_ip(&self, request: &Request) -> String {
        if self.trust_forwarded_headers {
            if let Some(ip) = Self::forwarded_ip(request.headers()) {
                return ip;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|value| value.to_str().ok())
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
            })
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn request_from(addr: &str) -> Request {
        let mut request = Request::new(Body::empty());
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_peer_address_key() {
        let generator = KeyGenerator::new(false);
        let request = request_from("192.168.1.9:52100");
        assert_eq!(generator.generate_key(&request), "ip:192.168.1.9");
    }

    #[test]
    fn test_forwarded_header_ignored_when_untrusted() {
        let generator = KeyGenerator::new(false);
        let mut request = request_from("10.0.0.1:4000");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        assert_eq!(generator.client_ip(&request), "10.0.0.1");
    }

    #[test]
    fn test_forwarded_header_when_trusted() {
        let generator = KeyGenerator::new(true);
        let mut request = request_from("10.0.0.1:4000");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        assert_eq!(generator.client_ip(&request), "192.168.1.1");
    }

    #[test]
    fn test_real_ip_header_when_trusted() {
        let generator = KeyGenerator::new(true);
        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));
        assert_eq!(generator.client_ip(&request), "203.0.113.1");
    }

    #[test]
    fn test_api_keys_never_collide_with_client_keys() {
        let generator = KeyGenerator::new(false);
        let request = request_from("10.0.0.5:4000");
        let client_key = generator.generate_key(&request);

        assert_eq!(KeyGenerator::api_key("ip:10.0.0.5"), "key:ip:10.0.0.5");
        assert_ne!(KeyGenerator::api_key("ip:10.0.0.5"), client_key);
        assert_ne!(KeyGenerator::api_key("10.0.0.5"), client_key);
    }

    #[test]
    fn test_unknown_fallback() {
        let generator = KeyGenerator::default();
        let request = Request::new(Body::empty());
        assert_eq!(generator.generate_key(&request), "ip:unknown");
    }
}
