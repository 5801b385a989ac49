//! Chat relay domain types.
//!
//! - [`ConnectionState`] - lifecycle of one persistent connection
//! - [`ChatPayload`] - the opaque body of a chat message

mod connection;
mod payload;

pub use connection::ConnectionState;
pub use payload::ChatPayload;
