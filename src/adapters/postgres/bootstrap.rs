//! Database bootstrap.
//!
//! The pool is established in the background so the listener never waits on
//! the database. Its progress is published on a `watch` channel:
//!
//! ```text
//! Disabled                      (no URL configured)
//! Connecting ──► Connected
//!            └─► Failed         (logged, not fatal)
//! ```

use std::sync::{Arc, OnceLock};

use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::DatabaseConfig;
use crate::domain::foundation::StateMachine;

/// Errors from establishing the connection pool.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database URL not configured")]
    NotConfigured,

    #[error("failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Progress of the database bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    Disabled,
    Connecting,
    Connected,
    Failed,
}

impl DatabaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseStatus::Disabled => "disabled",
            DatabaseStatus::Connecting => "connecting",
            DatabaseStatus::Connected => "connected",
            DatabaseStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for DatabaseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DatabaseStatus::*;
        matches!((self, target), (Connecting, Connected) | (Connecting, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DatabaseStatus::*;
        match self {
            Connecting => vec![Connected, Failed],
            Disabled | Connected | Failed => vec![],
        }
    }
}

/// Open a connection pool from configuration.
///
/// # Errors
///
/// Returns `DatabaseError::NotConfigured` without a URL, or the driver error
/// if no connection could be established within the acquire timeout.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let url = config.url.as_ref().ok_or(DatabaseError::NotConfigured)?;

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(url.expose_secret())
        .await?;

    Ok(pool)
}

/// Handle on the background database bootstrap.
///
/// Cheap to clone; every clone observes the same status and pool.
#[derive(Debug, Clone)]
pub struct Database {
    status: watch::Receiver<DatabaseStatus>,
    pool: Arc<OnceLock<PgPool>>,
}

impl Database {
    /// A handle for a process running without a database.
    pub fn disabled() -> Self {
        let (_tx, status) = watch::channel(DatabaseStatus::Disabled);
        Self {
            status,
            pool: Arc::new(OnceLock::new()),
        }
    }

    /// Start connecting in the background.
    ///
    /// Returns immediately. Without a configured URL the handle is
    /// `Disabled` and nothing is spawned. Must be called inside a Tokio
    /// runtime.
    pub fn spawn(config: &DatabaseConfig) -> Self {
        if !config.is_enabled() {
            tracing::info!("No database configured, skipping bootstrap");
            return Self::disabled();
        }

        let (tx, status) = watch::channel(DatabaseStatus::Connecting);
        let pool = Arc::new(OnceLock::new());
        let handle = Self {
            status,
            pool: pool.clone(),
        };

        let config = config.clone();
        tokio::spawn(async move {
            let next = match connect(&config).await {
                Ok(connected) => {
                    tracing::info!(
                        max_connections = config.max_connections,
                        "Database connected"
                    );
                    let _ = pool.set(connected);
                    DatabaseStatus::Connected
                }
                Err(e) => {
                    tracing::error!(error = %e, "Database bootstrap failed");
                    DatabaseStatus::Failed
                }
            };
            tx.send_modify(|current| {
                if let Ok(advanced) = current.transition_to(next) {
                    *current = advanced;
                }
            });
        });

        handle
    }

    /// Current bootstrap status.
    pub fn status(&self) -> DatabaseStatus {
        *self.status.borrow()
    }

    /// Close the pool, if one was established.
    ///
    /// Waits for checked-out connections to be returned. Does nothing while
    /// the bootstrap is still connecting or when it failed.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }

    /// Wait until the bootstrap has finished, successfully or not.
    pub async fn settled(&self) -> DatabaseStatus {
        let mut status = self.status.clone();
        loop {
            let current = *status.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if status.changed().await.is_err() {
                return *status.borrow();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            // Port 1 on loopback refuses connections
            url: Some(SecretString::new(
                "postgres://livechat@127.0.0.1:1/livechat".to_string(),
            )),
            acquire_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(DatabaseStatus::Connecting).unwrap(),
            serde_json::json!("connecting")
        );
        assert_eq!(DatabaseStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn connecting_settles_once() {
        let connected = DatabaseStatus::Connecting
            .transition_to(DatabaseStatus::Connected)
            .unwrap();
        assert!(connected.is_terminal());
        assert!(connected.transition_to(DatabaseStatus::Failed).is_err());
        assert!(DatabaseStatus::Disabled
            .transition_to(DatabaseStatus::Connecting)
            .is_err());
    }

    #[tokio::test]
    async fn spawn_without_url_is_disabled() {
        let db = Database::spawn(&DatabaseConfig::default());

        assert_eq!(db.status(), DatabaseStatus::Disabled);
        assert_eq!(db.settled().await, DatabaseStatus::Disabled);
        assert!(db.pool.get().is_none());
        db.close().await;
    }

    #[tokio::test]
    async fn connect_without_url_is_not_configured() {
        let result = connect(&DatabaseConfig::default()).await;
        assert!(matches!(result, Err(DatabaseError::NotConfigured)));
    }

    #[tokio::test]
    async fn unreachable_database_fails_without_blocking() {
        let db = Database::spawn(&unreachable_config());

        // spawn returns before the attempt resolves
        assert_eq!(db.status(), DatabaseStatus::Connecting);

        assert_eq!(db.settled().await, DatabaseStatus::Failed);
        assert!(db.pool.get().is_none());
        // Closing after a failed bootstrap is a no-op
        db.close().await;
        assert_eq!(db.status(), DatabaseStatus::Failed);
    }
}
