//! Error types for the domain layer.

use thiserror::Error;

/// A state machine was asked to move along an edge it does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: String,
    pub to: String,
}

impl InvalidTransition {
    /// Creates a transition error from the debug names of both states.
    pub fn new(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        Self {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}
