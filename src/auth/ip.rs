//! Client IP extraction for rate limiting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Key used when a request carries no usable address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort client address: the first `X-Forwarded-For` entry, else the
/// socket peer, else [`UNKNOWN_CLIENT`].
pub fn client_ip<B>(request: &Request<B>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
