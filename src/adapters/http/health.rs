//! Liveness endpoint.
//!
//! `GET /health` sits outside the rate limiter so probes are never throttled.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::adapters::postgres::{Database, DatabaseStatus};
use crate::adapters::websocket::BroadcastHub;

/// State for the health endpoint.
#[derive(Clone)]
pub struct HealthState {
    pub hub: Arc<BroadcastHub>,
    pub database: Database,
}

/// Health report body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
    pub database: DatabaseStatus,
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.hub.connection_count().await,
        database: state.database.status(),
    })
}

pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health_handler))
}
