//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay to the outside world:
//! - `websocket` - Chat socket transport and broadcast hub
//! - `http` - REST route groups and middleware
//! - `rate_limiter` - Admission control backends
//! - `postgres` - Database bootstrap

pub mod http;
pub mod postgres;
pub mod rate_limiter;
pub mod websocket;

pub use rate_limiter::InMemoryRateLimiter;
pub use websocket::{BroadcastHub, WebSocketState};
