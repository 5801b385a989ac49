//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and the error
//! types that the rest of the crate builds on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::InvalidTransition;
pub use ids::ConnectionId;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
