//! WebSocket transport configuration

use std::time::Duration;

use http::{HeaderValue, Method};
use serde::Deserialize;

use super::error::ValidationError;

/// Configuration for the chat socket endpoint and its handshake policy
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path the upgrade endpoint is mounted at
    #[serde(default = "default_path")]
    pub path: String,

    /// Origins allowed to open a socket (comma-separated)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,

    /// Methods allowed by the handshake CORS policy (comma-separated)
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: String,

    /// Per-connection outbound queue length
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Seconds a single socket write may take before the peer is treated as
    /// stalled and disconnected
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl SocketConfig {
    /// Allowed origins as trimmed strings
    pub fn allowed_origins_list(&self) -> Vec<String> {
        split_list(&self.allowed_origins)
    }

    /// Allowed origins as header values, skipping entries that don't parse
    pub fn allowed_origin_headers(&self) -> Vec<HeaderValue> {
        self.allowed_origins_list()
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect()
    }

    /// Allowed methods, skipping entries that don't parse
    pub fn allowed_methods_list(&self) -> Vec<Method> {
        split_list(&self.allowed_methods)
            .iter()
            .filter_map(|method| Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok())
            .collect()
    }

    /// Get send timeout as Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Check whether an `Origin` header value is allowed
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins_list()
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    /// Validate socket configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidSocketPath);
        }
        if self.outbound_buffer == 0 || self.outbound_buffer > MAX_OUTBOUND_BUFFER {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        if self.send_timeout_secs == 0 || self.send_timeout_secs > 300 {
            return Err(ValidationError::InvalidSendTimeout);
        }
        for origin in self.allowed_origins_list() {
            if HeaderValue::from_str(&origin).is_err() {
                return Err(ValidationError::InvalidOrigin(origin));
            }
        }
        for method in split_list(&self.allowed_methods) {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                return Err(ValidationError::InvalidMethod(method));
            }
        }
        Ok(())
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            allowed_origins: default_allowed_origins(),
            allowed_methods: default_allowed_methods(),
            outbound_buffer: default_outbound_buffer(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

const MAX_OUTBOUND_BUFFER: usize = 65_536;

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_allowed_origins() -> String {
    "http://localhost:5173".to_string()
}

fn default_allowed_methods() -> String {
    "GET,POST".to_string()
}

fn default_outbound_buffer() -> usize {
    1024
}

fn default_send_timeout_secs() -> u64 {
    10
}
