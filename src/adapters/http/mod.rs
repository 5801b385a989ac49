//! HTTP adapters - REST surface of the relay.
//!
//! - `routes` - The three rate-limited REST groups
//! - `health` - Liveness endpoint
//! - `middleware` - Cross-cutting layers

pub mod health;
pub mod middleware;
pub mod routes;

pub use health::{health_router, HealthState};
pub use routes::{
    not_implemented_group, rest_router, RouteGroups, AUTH_PATH, CHANNELS_PATH, SETTINGS_PATH,
};
