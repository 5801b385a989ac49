//! Process bootstrap.
//!
//! Builds the single application router (REST groups, health, chat socket),
//! binds one listener and serves until a shutdown signal arrives. On shutdown
//! the listener stops accepting and the hub closes every open connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::http::{
    health_router,
    middleware::{RateLimitState, RateLimiterState},
    rest_router, HealthState, RouteGroups,
};
use crate::adapters::postgres::Database;
use crate::adapters::rate_limiter::InMemoryRateLimiter;
use crate::adapters::websocket::{websocket_router, BroadcastHub, WebSocketState};
use crate::config::{AppConfig, ServerConfig, ValidationError};

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `server.log_level`. Output is JSON in production.
pub fn init_tracing(config: &ServerConfig) -> Result<(), ServerError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.is_production();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()?;

    Ok(())
}

/// The relay server: one hub, one limiter, one listener.
pub struct Server {
    config: AppConfig,
    hub: Arc<BroadcastHub>,
    limiter: RateLimiterState,
    database: Database,
    groups: RouteGroups,
}

impl Server {
    /// Create a server with default route groups and no database.
    pub fn new(config: AppConfig) -> Self {
        let hub = Arc::new(BroadcastHub::from_config(&config.socket));
        let limiter: RateLimiterState =
            Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()));

        Self {
            config,
            hub,
            limiter,
            database: Database::disabled(),
            groups: RouteGroups::default(),
        }
    }

    /// Supply the REST handler sets.
    pub fn with_route_groups(mut self, groups: RouteGroups) -> Self {
        self.groups = groups;
        self
    }

    /// Attach a database bootstrap handle for health reporting.
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = database;
        self
    }

    /// Replace the admission control backend.
    pub fn with_rate_limiter(mut self, limiter: RateLimiterState) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        self.hub.clone()
    }

    /// Build the complete application router.
    pub fn router(&self) -> Router {
        let rate_limit = RateLimitState::new(self.limiter.clone())
            .trust_forwarded_headers(self.config.rate_limit.trust_forwarded_headers);
        let rest = rest_router(self.groups.clone(), rate_limit)
            .layer(TimeoutLayer::new(self.config.server.request_timeout()));

        let health = health_router().with_state(HealthState {
            hub: self.hub.clone(),
            database: self.database.clone(),
        });

        let ws_state = WebSocketState::new(self.hub.clone(), Arc::new(self.config.socket.clone()));
        let socket = websocket_router(ws_state.clone()).with_state(ws_state);

        Router::new()
            .merge(rest)
            .merge(health)
            .merge(socket)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.server.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    ///
    /// On shutdown the hub closes every socket before the listener drains,
    /// and refuses any handshake that completes afterwards.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let app = self.router();
        let hub = self.hub.clone();
        let database = self.database.clone();

        tracing::info!(
            %addr,
            socket_path = %self.config.socket.path,
            environment = ?self.config.server.environment,
            "Server listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, closing connections");
            hub.shutdown().await;
        })
        .await?;

        database.close().await;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let peer: SocketAddr = "198.51.100.1:40000".parse().unwrap();
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn router_serves_health_outside_rate_limiter() {
        let config = AppConfig {
            rate_limit: crate::config::RateLimitConfig {
                requests_per_window: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let app = Server::new(config).router();

        for _ in 0..3 {
            let response = app.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn router_mounts_rest_groups() {
        let app = Server::new(AppConfig::default()).router();

        let response = app.oneshot(get("/twitch/v1/settings/theme")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = Server::new(AppConfig::default()).router();

        let response = app.oneshot(get("/health")).await.unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn incoming_request_id_is_propagated() {
        let app = Server::new(AppConfig::default()).router();
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn socket_route_follows_configured_path() {
        let mut config = AppConfig::default();
        config.socket.path = "/chat".to_string();
        let app = Server::new(config).router();

        let moved = app.clone().oneshot(get("/chat")).await.unwrap();
        let old = app.oneshot(get("/ws")).await.unwrap();

        // Without upgrade headers the handshake is rejected, but the route exists
        assert_ne!(moved.status(), StatusCode::NOT_FOUND);
        assert_eq!(old.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_and_closes_hub() {
        let server = Server::new(AppConfig::default());
        let hub = server.hub();
        let mut rx = hub
            .on_connect(crate::domain::foundation::ConnectionId::new())
            .await
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server.serve(listener, async {}).await.unwrap();

        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(rx.recv().await, None);
        assert!(hub
            .on_connect(crate::domain::foundation::ConnectionId::new())
            .await
            .is_err());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn forwarded_headers_are_ignored_by_default() {
        let config = AppConfig {
            rate_limit: crate::config::RateLimitConfig {
                requests_per_window: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let app = Server::new(config).router();

        let mut statuses = Vec::new();
        for client in ["192.0.2.1", "192.0.2.2"] {
            let mut request = get("/twitch/v1/auth/x");
            request
                .headers_mut()
                .insert("X-Forwarded-For", client.parse().unwrap());
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(
            statuses,
            vec![StatusCode::NOT_IMPLEMENTED, StatusCode::TOO_MANY_REQUESTS]
        );
    }

    #[tokio::test]
    async fn forwarded_headers_are_honored_when_trusted() {
        let config = AppConfig {
            rate_limit: crate::config::RateLimitConfig {
                requests_per_window: 1,
                trust_forwarded_headers: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let app = Server::new(config).router();

        for client in ["192.0.2.1", "192.0.2.2"] {
            let mut request = get("/twitch/v1/auth/x");
            request
                .headers_mut()
                .insert("X-Forwarded-For", client.parse().unwrap());
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        }
    }

    #[test]
    fn run_rejects_unparseable_host() {
        let mut config = AppConfig::default();
        config.server.host = "not a host".to_string();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let result = runtime.block_on(Server::new(config).run());

        assert!(matches!(
            result,
            Err(ServerError::Config(ValidationError::InvalidHost(_)))
        ));
    }
}
