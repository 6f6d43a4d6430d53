//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down credential
//! and verification code guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for sign-up, sign-in and verify.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub auth: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// `per_second` sustained requests per IP, with bursts of up to `burst`.
    /// Zero values are raised to one.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);

        Self {
            auth: Arc::new(RateLimiter::keyed(
                Quota::per_second(per_second).allow_burst(burst),
            )),
        }
    }

    /// Forget clients whose buckets have fully refilled. Returns how many remain tracked.
    pub fn retain_recent(&self) -> usize {
        self.auth.retain_recent();
        self.auth.shrink_to_fit();
        self.auth.len()
    }
}

/// Middleware for rate limiting authentication endpoints.
pub async fn rate_limit_auth(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match config.auth.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "error": "Too many requests. Please try again later."
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let config = RateLimitConfig::new(1, 2);
        let ip = "10.0.0.1".to_string();

        assert!(config.auth.check_key(&ip).is_ok());
        assert!(config.auth.check_key(&ip).is_ok());
        assert!(config.auth.check_key(&ip).is_err());

        // Other clients have their own bucket
        assert!(config.auth.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_retain_recent_drops_idle_clients() {
        let config = RateLimitConfig::new(1000, 1);
        assert!(config.auth.check_key(&"10.0.0.1".to_string()).is_ok());
        assert_eq!(config.auth.len(), 1);

        // One cell refills in a millisecond at 1000/s
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(config.retain_recent(), 0);
    }

    #[test]
    fn test_retain_recent_keeps_limited_clients() {
        let config = RateLimitConfig::new(1, 1);
        assert!(config.auth.check_key(&"10.0.0.1".to_string()).is_ok());
        assert_eq!(config.retain_recent(), 1);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = RateLimitConfig::new(0, 0);
        assert!(config.auth.check_key(&"10.0.0.1".to_string()).is_ok());
    }
}
