//! Rate limiting middleware for axum.
//!
//! Enforces the `RateLimiter` port in front of the REST route groups.
//!
//! # Architecture
//!
//! The middleware checks two scopes in order:
//! 1. Global rate limit (infrastructure protection)
//! 2. Per-IP rate limit (one client cannot starve the others)
//!
//! Rate limit status is returned in standard HTTP headers:
//! - `X-RateLimit-Limit`: Maximum requests allowed in the window
//! - `X-RateLimit-Remaining`: Requests remaining in the current window
//! - `X-RateLimit-Reset`: Unix timestamp when the window resets
//! - `Retry-After`: Seconds to wait (only on 429 response)
//!
//! # Example
//!
//! The client is keyed by the socket peer address. Forwarded headers are
//! honored only when the state says the listener sits behind a trusted proxy.
//!
//! ```ignore
//! use axum::{Router, routing::get, middleware};
//! use std::sync::Arc;
//!
//! let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::new(config));
//! let state = RateLimitState::new(limiter);
//!
//! let app = Router::new()
//!     .route("/twitch/v1/channels", get(handler))
//!     .layer(middleware::from_fn_with_state(state, rate_limit_middleware));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::ports::{RateLimitKey, RateLimitResult, RateLimiter};

/// Shared admission control backend.
pub type RateLimiterState = Arc<dyn RateLimiter>;

/// State for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiterState,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only safe when every request arrives through a proxy that
    /// overwrites these headers.
    pub trust_forwarded_headers: bool,
}

impl RateLimitState {
    /// State keyed by the socket peer address.
    pub fn new(limiter: RateLimiterState) -> Self {
        Self {
            limiter,
            trust_forwarded_headers: false,
        }
    }

    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}

/// Standard rate limit header names.
pub mod headers {
    use super::HeaderName;

    /// Maximum requests allowed in the window.
    pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    /// Requests remaining in the current window.
    pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    /// Unix timestamp when the window resets.
    pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
}

/// Rate limiting middleware that checks global and per-IP limits.
///
/// This middleware:
/// 1. Extracts client IP from `ConnectInfo` (or forwarded headers, if trusted)
/// 2. Checks the global limit, then the per-IP limit
/// 3. Returns 429 Too Many Requests if either limit is exceeded
/// 4. Adds the per-IP window's headers to every admitted response
///
/// A limiter backend error fails open.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let limiter = &state.limiter;
    let client_ip = extract_client_ip(
        &request,
        connect_info.as_ref(),
        state.trust_forwarded_headers,
    );

    match limiter.check(RateLimitKey::global()).await {
        Ok(RateLimitResult::Denied(denied)) => {
            tracing::warn!(limit = denied.limit, "Global rate limit exceeded");
            return rate_limit_response(denied.limit, 0, denied.retry_after_secs);
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable: {}", e);
        }
        Ok(RateLimitResult::Allowed(_)) => {}
    }

    let ip_status = match &client_ip {
        Some(ip) => match limiter.check(RateLimitKey::ip(ip)).await {
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::debug!(client_ip = %ip, limit = denied.limit, "IP rate limit exceeded");
                return rate_limit_response(denied.limit, 0, denied.retry_after_secs);
            }
            Ok(RateLimitResult::Allowed(status)) => Some(status),
            Err(e) => {
                tracing::warn!("Rate limiter unavailable for IP check: {}", e);
                None
            }
        },
        None => None,
    };

    let mut response = next.run(request).await;

    if let Some(status) = ip_status {
        add_rate_limit_headers(
            &mut response,
            status.limit,
            status.remaining,
            status.reset_at.as_unix_secs(),
        );
    }

    response
}

/// Extract client IP from request.
///
/// Without `trust_forwarded` only the socket peer counts. With it, the order
/// of precedence is:
/// 1. X-Forwarded-For header (first IP in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
fn extract_client_ip<B>(
    request: &axum::http::Request<B>,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded: bool,
) -> Option<String> {
    let peer = connect_info.map(|ci| ci.0.ip().to_string());
    if !trust_forwarded {
        return peer;
    }

    if let Some(forwarded) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
    {
        // Take the first IP (client IP, before any proxies)
        if let Some(first_ip) = forwarded.split(',').next() {
            let first_ip = first_ip.trim();
            if !first_ip.is_empty() {
                return Some(first_ip.to_string());
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
    {
        return Some(real_ip.trim().to_string());
    }

    peer
}

/// Create a 429 Too Many Requests response.
fn rate_limit_response(limit: u32, remaining: u32, retry_after_secs: u32) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "Rate limit exceeded",
            "code": "RATE_LIMIT_EXCEEDED",
            "retry_after_secs": retry_after_secs
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(headers::X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(
        headers::X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(remaining),
    );
    headers.insert(
        axum::http::header::RETRY_AFTER,
        HeaderValue::from(retry_after_secs),
    );

    response
}

/// Add rate limit headers to a response.
fn add_rate_limit_headers(response: &mut Response, limit: u32, remaining: u32, reset_at: u64) {
    let headers = response.headers_mut();
    headers.insert(headers::X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(
        headers::X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(remaining),
    );
    headers.insert(headers::X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at));
}
