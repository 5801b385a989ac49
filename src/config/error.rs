//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind host: {0}")]
    InvalidHost(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Socket path must start with '/'")]
    InvalidSocketPath,

    #[error("Socket outbound buffer must be between 1 and 65536")]
    InvalidOutboundBuffer,

    #[error("Socket send timeout must be between 1 and 300 seconds")]
    InvalidSendTimeout,

    #[error("Invalid allowed origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid allowed method: {0}")]
    InvalidMethod(String),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Rate limit window and request counts must be non-zero")]
    InvalidRateLimit,
}
