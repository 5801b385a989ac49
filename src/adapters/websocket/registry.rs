//! Live connection registry.
//!
//! Maps each open connection's id to the handle used to push messages to it.
//! The registry itself is a plain map; [`BroadcastHub`] owns it behind a lock
//! so that one fan-out iterates a membership set no writer can change
//! mid-iteration.
//!
//! [`BroadcastHub`]: super::BroadcastHub

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::chat::ChatPayload;
use crate::domain::foundation::{ConnectionId, Timestamp};

/// Why a payload could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The connection's outbound queue is full (slow consumer).
    #[error("outbound queue full")]
    Full,

    /// The connection's writer has already gone away.
    #[error("connection closed")]
    Closed,
}

/// Outbound side of one registered connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<ChatPayload>,
    opened_at: Timestamp,
}

impl ConnectionHandle {
    /// Create a handle around the sending half of a connection's queue.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<ChatPayload>) -> Self {
        Self {
            id,
            outbound,
            opened_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// Queue a payload without waiting.
    ///
    /// Never blocks: a full or closed queue fails immediately so one slow
    /// connection cannot hold up delivery to the others.
    pub fn try_deliver(&self, payload: ChatPayload) -> Result<(), DeliveryError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Authoritative set of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its id.
    ///
    /// Returns the handle previously stored under the same id, if any.
    pub fn add(&mut self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(handle.id(), handle)
    }

    /// Remove a connection. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(id)
    }

    /// Visit every registered connection.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&ConnectionHandle),
    {
        for handle in self.connections.values() {
            visitor(handle);
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Remove every connection, returning the handles.
    pub fn drain(&mut self) -> Vec<ConnectionHandle> {
        self.connections.drain().map(|(_, handle)| handle).collect()
    }
}
