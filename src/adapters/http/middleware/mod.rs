//! HTTP middleware for axum.
//!
//! This module contains middleware layers for cross-cutting concerns:
//!
//! - `rate_limit` - Per-IP and global admission control for REST routes

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimitState, RateLimiterState};
