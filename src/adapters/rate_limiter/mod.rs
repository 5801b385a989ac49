//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - fixed-window counters for a single process
//!
//! ## Usage
//!
//! ```ignore
//! use livechat::adapters::rate_limiter::InMemoryRateLimiter;
//! use livechat::config::RateLimitConfig;
//!
//! let limiter = InMemoryRateLimiter::new(RateLimitConfig::default());
//! ```

mod in_memory;

pub use in_memory::InMemoryRateLimiter;
