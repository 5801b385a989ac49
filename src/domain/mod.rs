//! Domain layer containing the relay's core types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, state machines)
//! - `chat` - Connection lifecycle and the opaque chat payload

pub mod chat;
pub mod foundation;
