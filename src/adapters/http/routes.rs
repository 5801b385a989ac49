//! REST route groups.
//!
//! Three groups are mounted under fixed prefixes, each behind the shared
//! rate limiter:
//!
//! - `/twitch/v1/auth` - authentication
//! - `/twitch/v1/channels` - channel operations
//! - `/twitch/v1/settings` - channel settings
//!
//! The handlers inside each group are supplied by the caller. The prefixes,
//! admission control and response headers are fixed here.

use axum::{
    extract::OriginalUri,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};

use super::middleware::{rate_limit_middleware, RateLimitState};

/// Prefix of the authentication group.
pub const AUTH_PATH: &str = "/twitch/v1/auth";

/// Prefix of the channel operations group.
pub const CHANNELS_PATH: &str = "/twitch/v1/channels";

/// Prefix of the channel settings group.
pub const SETTINGS_PATH: &str = "/twitch/v1/settings";

/// Handler sets for the three REST groups.
///
/// Routes inside each router are relative to the group prefix.
#[derive(Debug, Clone)]
pub struct RouteGroups {
    pub auth: Router,
    pub channels: Router,
    pub settings: Router,
}

impl RouteGroups {
    pub fn new(auth: Router, channels: Router, settings: Router) -> Self {
        Self {
            auth,
            channels,
            settings,
        }
    }
}

impl Default for RouteGroups {
    /// Every group answers `501 Not Implemented`.
    fn default() -> Self {
        Self::new(not_implemented_group(), not_implemented_group(), not_implemented_group())
    }
}

/// A group whose every route answers `501 Not Implemented`.
pub fn not_implemented_group() -> Router {
    Router::new()
        .route("/", any(not_implemented))
        .route("/*rest", any(not_implemented))
}

async fn not_implemented(OriginalUri(uri): OriginalUri) -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({
            "error": "Not implemented",
            "code": "NOT_IMPLEMENTED",
            "path": uri.path()
        })),
    )
        .into_response()
}

/// Create the REST router.
///
/// Mounts the three groups at their prefixes and applies, outermost first:
/// permissive CORS, security response headers, then the rate limiter. A
/// request rejected by the limiter never reaches its group.
///
/// # Example
///
/// ```ignore
/// let limiter: RateLimiterState = Arc::new(InMemoryRateLimiter::new(config));
/// let app = Router::new().merge(rest_router(RouteGroups::default(), RateLimitState::new(limiter)));
/// ```
pub fn rest_router(groups: RouteGroups, rate_limit: RateLimitState) -> Router {
    Router::new()
        .nest(AUTH_PATH, groups.auth)
        .nest(CHANNELS_PATH, groups.channels)
        .nest(SETTINGS_PATH, groups.settings)
        .layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CorsLayer::permissive())
}
