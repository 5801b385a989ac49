//! Livechat - REST backend with a real-time chat relay
//!
//! One listener serves two kinds of traffic: REST route groups (auth,
//! channels, channel settings) behind admission control, and WebSocket
//! connections attached to a broadcast hub that relays every chat message to
//! every connected client.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
