//! WebSocket adapters for the real-time chat relay.
//!
//! Every connected client can publish a `chat-message`, and every connected
//! client (the sender included) receives it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  chat-message   ┌──────────────────────────────────────┐
//! │  client-a    │ ──────────────► │            BroadcastHub              │
//! └──────────────┘                 │   on_connect / on_message /          │
//!                                  │   on_disconnect                      │
//! ┌──────────────┐                 │                                      │
//! │  client-b    │ ◄────────────── │   ConnectionRegistry                 │
//! └──────────────┘  chat-message   │   ├── conn-1 ─► outbound queue       │
//!                                  │   ├── conn-2 ─► outbound queue       │
//! ┌──────────────┐                 │   └── conn-3 ─► outbound queue       │
//! │  client-c    │ ◄────────────── │                                      │
//! └──────────────┘                 └──────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire frame types
//! - [`registry`] - Set of open connections and their outbound queues
//! - [`hub`] - Connection lifecycle and fan-out
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod hub;
pub mod messages;
pub mod registry;

pub use handler::{origin_guard, socket_cors, websocket_router, ws_handler, WebSocketState};
pub use hub::{BroadcastHub, FanOutReport, HubClosed, Outbound};
pub use messages::{ClientEvent, ConnectedData, ServerEvent, CHAT_MESSAGE_EVENT, CONNECTED_EVENT};
pub use registry::{ConnectionHandle, ConnectionRegistry, DeliveryError};
