//! Rate limit configuration

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Admission control limits for REST traffic.
///
/// Both scopes use fixed windows of `window_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client IP
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,

    /// Maximum requests per window across all clients
    #[serde(default = "default_global_requests_per_window")]
    pub global_requests_per_window: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Enable only behind a proxy that sets these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl RateLimitConfig {
    /// Validate rate limit configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.requests_per_window == 0
            || self.global_requests_per_window == 0
            || self.window_secs == 0
        {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            global_requests_per_window: default_global_requests_per_window(),
            window_secs: default_window_secs(),
            trust_forwarded_headers: false,
        }
    }
}

fn default_requests_per_window() -> u32 {
    100
}

fn default_global_requests_per_window() -> u32 {
    10_000
}

fn default_window_secs() -> u32 {
    15 * 60
}
