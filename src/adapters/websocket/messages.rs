//! WebSocket message types for the chat relay.
//!
//! Every frame is a JSON text frame shaped as `{"event": <kind>, "data": <any>}`:
//! - Client → Server: `chat-message` carries an opaque payload; other kinds are
//!   accepted on the wire but ignored by the relay
//! - Server → Client: `connected` once per connection, then `chat-message`
//!   for every broadcast

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::chat::ChatPayload;
use crate::domain::foundation::ConnectionId;

/// Event kind for chat content, in both directions.
pub const CHAT_MESSAGE_EVENT: &str = "chat-message";

/// Event kind for the accept notice sent to a new connection.
pub const CONNECTED_EVENT: &str = "connected";

// ============================================
// Client → Server Messages
// ============================================

/// Raw inbound frame before the event kind is interpreted.
#[derive(Debug, Clone, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// An inbound frame after its kind has been recognised (or not).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Chat content to relay to every connection.
    ChatMessage(ChatPayload),

    /// A well-formed frame of a kind the relay does not subscribe to.
    Unrecognized(String),
}

impl ClientEvent {
    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the frame is not an `{event, data}` object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        Ok(if frame.event == CHAT_MESSAGE_EVENT {
            ClientEvent::ChatMessage(ChatPayload::new(frame.data))
        } else {
            ClientEvent::Unrecognized(frame.event)
        })
    }
}

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Connection accepted; tells the client its server-assigned id.
    #[serde(rename = "connected")]
    Connected(ConnectedData),

    /// A relayed chat message, payload untouched.
    #[serde(rename = "chat-message")]
    ChatMessage(ChatPayload),
}

/// Body of the `connected` notice.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedData {
    pub id: ConnectionId,
}

impl ServerEvent {
    /// Build the accept notice for a connection.
    pub fn connected(id: ConnectionId) -> Self {
        ServerEvent::Connected(ConnectedData { id })
    }

    /// Serialize to the text frame body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
