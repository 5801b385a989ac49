//! Broadcast hub for the chat relay.
//!
//! The hub owns the [`ConnectionRegistry`] and implements the three
//! lifecycle hooks the transport calls:
//!
//! ```text
//!  accept ──► on_connect ──► Open ──► on_message* ──► on_disconnect ──► Closed
//! ```
//!
//! Every chat message is re-published to every open connection, sender
//! included. There are no rooms and no filtering.
//!
//! # Concurrency
//!
//! The registry sits behind a `RwLock`. Registration and removal take the
//! write lock; a fan-out holds the read lock for its whole iteration, so the
//! recipient set of one broadcast is a stable snapshot and never interleaves
//! with a concurrent connect or disconnect. Deliveries are non-blocking
//! `try_send`s on bounded per-connection queues; a full queue costs that
//! connection the message and nothing else.
//!
//! Once [`BroadcastHub::shutdown`] has run, the hub refuses new connections.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use crate::config::SocketConfig;
use crate::domain::chat::{ChatPayload, ConnectionState};
use crate::domain::foundation::ConnectionId;

use super::registry::{ConnectionHandle, ConnectionRegistry, DeliveryError};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Connections the payload was queued for.
    pub delivered: usize,
    /// Connections whose queue rejected the payload.
    pub failed: Vec<(ConnectionId, DeliveryError)>,
}

impl FanOutReport {
    /// Total connections the hub attempted to reach.
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Receiving side of one connection's outbound queue.
///
/// Returned by [`BroadcastHub::on_connect`]; the transport drains it into
/// the socket.
#[derive(Debug)]
pub struct Outbound {
    rx: mpsc::Receiver<ChatPayload>,
}

impl Outbound {
    /// Next queued payload, or `None` once the hub has dropped the connection.
    pub async fn recv(&mut self) -> Option<ChatPayload> {
        self.rx.recv().await
    }
}

/// The hub has shut down and accepts no further connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("broadcast hub is shut down")]
pub struct HubClosed;

/// Relays chat messages between all connected clients.
///
/// Constructed once at bootstrap and shared behind an `Arc` by everything
/// that attaches it to the listener.
#[derive(Debug)]
pub struct BroadcastHub {
    registry: RwLock<ConnectionRegistry>,
    outbound_buffer: usize,
    /// Set by `shutdown`; only read or written under the registry write lock.
    closed: AtomicBool,
}

impl BroadcastHub {
    /// Create a hub whose connections each queue up to `outbound_buffer`
    /// undelivered messages.
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            registry: RwLock::new(ConnectionRegistry::new()),
            outbound_buffer: outbound_buffer.max(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &SocketConfig) -> Self {
        Self::new(config.outbound_buffer)
    }

    /// Register a newly accepted connection.
    ///
    /// Returns the receiving half of the connection's outbound queue. The
    /// queue closes when the connection is removed from the hub.
    ///
    /// # Errors
    ///
    /// Returns `HubClosed` once [`shutdown`](Self::shutdown) has run; the
    /// connection is not registered.
    pub async fn on_connect(&self, id: ConnectionId) -> Result<Outbound, HubClosed> {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);

        let mut registry = self.registry.write().await;
        if self.closed.load(Ordering::Acquire) {
            drop(registry);
            tracing::debug!(connection_id = %id, "Refusing connection after shutdown");
            return Err(HubClosed);
        }
        if registry.add(ConnectionHandle::new(id, tx)).is_some() {
            tracing::warn!(connection_id = %id, "Connection id reused, replaced previous handle");
        }
        let connections = registry.len();
        drop(registry);

        tracing::info!(connection_id = %id, connections, "Client connected");
        Ok(Outbound { rx })
    }

    /// Publish a chat payload from `from` to every open connection.
    ///
    /// The sender receives its own message back. Payloads from a connection
    /// that is no longer open are dropped. A connection whose queue rejects
    /// the payload is skipped for this message only; it is not retried and
    /// not removed here, the transport reports its disconnect on its own.
    pub async fn on_message(&self, from: &ConnectionId, payload: ChatPayload) -> FanOutReport {
        let registry = self.registry.read().await;

        if !registry.contains(from) {
            tracing::debug!(connection_id = %from, "Dropping message from closed connection");
            return FanOutReport::default();
        }

        let mut report = FanOutReport::default();
        registry.for_each(|handle| match handle.try_deliver(payload.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                match e {
                    DeliveryError::Full => tracing::warn!(
                        connection_id = %handle.id(),
                        "Outbound queue full, skipping message"
                    ),
                    DeliveryError::Closed => {
                        tracing::debug!(connection_id = %handle.id(), error = %e, "Delivery failed")
                    }
                }
                report.failed.push((handle.id(), e));
            }
        });
        drop(registry);

        tracing::debug!(
            connection_id = %from,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Broadcast chat message"
        );
        report
    }

    /// Remove a connection after the transport saw it terminate.
    ///
    /// Returns `false` if the connection was already gone.
    pub async fn on_disconnect(&self, id: &ConnectionId) -> bool {
        let mut registry = self.registry.write().await;
        let removed = registry.remove(id);
        let connections = registry.len();
        drop(registry);

        match removed {
            Some(handle) => {
                tracing::info!(
                    connection_id = %id,
                    connections,
                    open_secs = handle.opened_at().elapsed().num_seconds(),
                    "Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Lifecycle state of a connection as seen by the hub.
    ///
    /// The hub never observes the handshake, so anything not registered is
    /// reported as `Closed`.
    pub async fn state_of(&self, id: &ConnectionId) -> ConnectionState {
        if self.registry.read().await.contains(id) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.read().await.ids()
    }

    /// Close every connection and refuse new ones.
    ///
    /// Dropping the handles closes each outbound queue, which ends the
    /// transport's writer for that socket. Returns how many were closed.
    pub async fn shutdown(&self) -> usize {
        let mut registry = self.registry.write().await;
        self.closed.store(true, Ordering::Release);
        let closed = registry.drain();
        drop(registry);

        tracing::info!(connections = closed.len(), "Broadcast hub shut down");
        closed.len()
    }

}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::from_config(&SocketConfig::default())
    }
}
